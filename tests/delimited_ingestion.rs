use std::fs::File;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tabular_ingest::ingestion::convert::convert_text;
use tabular_ingest::ingestion::{ColumnOverrides, HeaderHint, RowSource, SourceOptions, StaticIndicators};
use tabular_ingest::types::{Cell, ColumnType, ErrorPolicy, MissingValueCell, Value};
use tabular_ingest::IngestionError;

fn jan_2_2006() -> Value {
    Value::Date(
        NaiveDate::from_ymd_opt(2006, 1, 2)
            .unwrap()
            .and_time(NaiveTime::MIN),
    )
}

fn column_types(source: &mut RowSource) -> Vec<(String, ColumnType)> {
    source
        .columns()
        .unwrap()
        .iter()
        .map(|c| (c.name.clone(), c.column_type))
        .collect()
}

#[test]
fn people_csv_infers_types_and_reads_rows() {
    let mut source = RowSource::delimited_path("tests/fixtures/people.csv", SourceOptions::csv());
    assert_eq!(
        column_types(&mut source),
        vec![
            ("id".to_string(), ColumnType::Integer),
            ("name".to_string(), ColumnType::String),
            ("score".to_string(), ColumnType::Double),
            ("active".to_string(), ColumnType::Boolean),
            ("joined".to_string(), ColumnType::Date),
        ]
    );

    let rows = source.load().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[0].values(),
        vec![
            Value::Integer(1),
            Value::String("Ada".into()),
            Value::Double(98.5),
            Value::Boolean(true),
            jan_2_2006(),
        ]
    );
    assert_eq!(rows[1].value("name"), Some(&Value::String("Hopper, Grace".into())));
    assert_eq!(rows[2].value("name"), Some(&Value::String("Said \"hi\"".into())));
    assert_eq!(rows[2].value("score"), Some(&Value::Null));
    assert_eq!(rows[3].value("active"), Some(&Value::Boolean(true)));
    assert_eq!(rows[3].value("joined"), Some(&Value::Null));

    // Every spelling in the joined column lands on the same day.
    for row in &rows[..3] {
        assert_eq!(row.value("joined"), Some(&jan_2_2006()));
    }
    assert_eq!(rows.iter().map(|r| r.line()).collect::<Vec<_>>(), vec![2, 3, 4, 5]);
}

#[test]
fn converted_values_survive_a_text_round_trip() {
    let mut source = RowSource::delimited_path("tests/fixtures/people.csv", SourceOptions::csv());
    let columns = source.columns().unwrap();
    for row in source.load().unwrap() {
        for (col, value) in columns.iter().zip(row.values()) {
            if value.is_null() {
                continue;
            }
            assert_eq!(convert_text(&value.to_string(), col.column_type), Ok(value.clone()));
        }
    }
}

#[test]
fn headerless_records_get_positional_names() {
    let mut source = RowSource::delimited_text("1,2\n3,4\n", SourceOptions::csv());
    assert_eq!(
        column_types(&mut source),
        vec![
            ("column0".to_string(), ColumnType::Integer),
            ("column1".to_string(), ColumnType::Integer),
        ]
    );
    let values: Vec<_> = source.load().unwrap().iter().map(|r| r.values()).collect();
    assert_eq!(
        values,
        vec![
            vec![Value::Integer(1), Value::Integer(2)],
            vec![Value::Integer(3), Value::Integer(4)],
        ]
    );
}

#[test]
fn prepended_header_with_present_hint() {
    let opts = SourceOptions::csv().with_header(HeaderHint::Present);
    let mut source = RowSource::delimited_text("A,B\n1,2\n3,4\n", opts);
    assert_eq!(
        column_types(&mut source),
        vec![
            ("A".to_string(), ColumnType::Integer),
            ("B".to_string(), ColumnType::Integer),
        ]
    );
    let rows = source.load().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].value("b"), Some(&Value::Integer(4)));

    // The same header is detected without a hint.
    let mut detected = RowSource::delimited_text("A,B\n1,2\n3,4\n", SourceOptions::csv());
    assert_eq!(detected.load().unwrap(), rows);
}

#[test]
fn inference_runs_once_per_source() {
    let mut source = RowSource::delimited_path("tests/fixtures/people.csv", SourceOptions::csv());
    let first = source.columns().unwrap();
    let second = source.columns().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(source.open_count(), 1);

    // Each iteration opens the file once more; inference is not repeated.
    let _ = source.rows().unwrap().count();
    assert_eq!(source.open_count(), 2);
    assert!(Arc::ptr_eq(&source.columns().unwrap(), &first));
}

#[test]
fn doubled_quotes_and_embedded_newlines() {
    let text = "id,note\n1,\"a\"\"b\"\n2,\"line one\nline two\"\n3,plain\n";
    let mut source = RowSource::delimited_text(text, SourceOptions::csv());
    let rows = source.load().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].value("note"), Some(&Value::String("a\"b".into())));
    assert_eq!(rows[1].value("note"), Some(&Value::String("line one\nline two".into())));
    assert_eq!(rows[2].line(), 5);
}

#[test]
fn missing_value_indicators_and_preamble_metadata() {
    let mut source = RowSource::delimited_path("tests/fixtures/features.tsv", SourceOptions::tsv())
        .with_indicators(Arc::new(StaticIndicators::standard()));

    let comments = source.comments().unwrap().clone();
    assert_eq!(comments.get("assay").map(String::as_str), Some("plate-7"));
    assert_eq!(comments.get("operator").map(String::as_str), Some("jdoe"));

    let columns = source.columns().unwrap();
    let value = columns.by_name("value").unwrap();
    assert_eq!(value.column_type, ColumnType::Double);
    assert!(value.mv_enabled);
    let indicator = columns.by_name("Value_MVIndicator").unwrap();
    assert_eq!(indicator.mv_indicator_of.as_deref(), Some("Value"));
    assert_eq!(columns.by_name("Taken").unwrap().column_type, ColumnType::TimeOfDay);

    let rows = source.load().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].value("Sample"), Some(&Value::String("S-1".into())));
    assert_eq!(
        rows[0].get("Value"),
        Some(&Cell::Missing(MissingValueCell::new(Value::Double(1.25))))
    );
    assert_eq!(
        rows[1].get("Value"),
        Some(&Cell::Missing(MissingValueCell::indicated("Q")))
    );
    let annotated = Cell::Missing(MissingValueCell {
        value: Value::Double(2.5),
        indicator: Some("N".into()),
    });
    assert_eq!(rows[2].get("Value"), Some(&annotated));
    assert_eq!(rows[2].get("Value_MVIndicator"), Some(&annotated));
    assert_eq!(
        rows[1].value("Taken"),
        Some(&Value::TimeOfDay(NaiveTime::from_hms_opt(10, 15, 30).unwrap()))
    );
    assert_eq!(rows[3].line(), 8);
}

#[test]
fn without_indicators_tokens_stay_data() {
    let mut source = RowSource::delimited_path("tests/fixtures/features.tsv", SourceOptions::tsv());
    let columns = source.columns().unwrap();
    // "Q" does not fit Double, so the column widens to String.
    assert_eq!(columns.by_name("Value").unwrap().column_type, ColumnType::String);
    let rows = source.load().unwrap();
    assert_eq!(rows[1].value("Value"), Some(&Value::String("Q".into())));
    assert_eq!(rows[1].get("Value").and_then(Cell::indicator), None);
}

#[test]
fn blank_line_policy_changes_length_by_the_blank_rows() {
    let skipping = RowSource::delimited_path("tests/fixtures/features.tsv", SourceOptions::tsv())
        .load()
        .unwrap();
    let opts = SourceOptions {
        include_blank_lines: true,
        ..SourceOptions::tsv()
    };
    let keeping = RowSource::delimited_path("tests/fixtures/features.tsv", opts)
        .load()
        .unwrap();
    assert_eq!(keeping.len(), skipping.len() + 1);
    let blank = &keeping[3];
    assert_eq!(blank.line(), 7);
    assert!(blank.values().iter().all(Value::is_null));
}

#[test]
fn single_pass_reader_supports_one_iteration() {
    let file = File::open("tests/fixtures/people.csv").unwrap();
    let mut source = RowSource::delimited_reader(file, SourceOptions::csv());
    assert!(!source.is_scrollable());
    assert_eq!(source.columns().unwrap().len(), 5);
    assert_eq!(source.rows().unwrap().count(), 4);
    assert!(matches!(source.rows(), Err(IngestionError::Usage { .. })));
    assert_eq!(source.open_count(), 1);
}

#[test]
fn overrides_apply_to_one_iteration_only() {
    let mut source = RowSource::delimited_path("tests/fixtures/people.csv", SourceOptions::csv());
    let overrides = ColumnOverrides::new().rename("name", "full_name").skip("joined");
    let row = source.rows_with(&overrides).unwrap().next().unwrap().unwrap();
    assert_eq!(row.len(), 4);
    assert_eq!(row.value("full_name"), Some(&Value::String("Ada".into())));
    assert!(row.get("joined").is_none());

    let row = source.rows().unwrap().next().unwrap().unwrap();
    assert_eq!(row.len(), 5);
    assert!(row.get("full_name").is_none());
}

#[test]
fn strict_mode_reports_the_failing_row_and_continues() {
    let text = "n,label\n1,a\n2,b\nthree,c\n4,d\n";
    let opts = SourceOptions {
        inference_sample_size: 3,
        ..SourceOptions::csv().strict()
    };
    let results: Vec<_> = RowSource::delimited_text(text, opts).rows().unwrap().collect();
    assert_eq!(results.len(), 4);
    match &results[2] {
        Err(IngestionError::Conversion { line, column, name, raw, target, .. }) => {
            assert_eq!((*line, *column), (4, 1));
            assert_eq!(name, "n");
            assert_eq!(raw, "three");
            assert_eq!(*target, ColumnType::Integer);
        }
        other => panic!("expected a conversion error, got {other:?}"),
    }
    assert_eq!(results[3].as_ref().unwrap().value("n"), Some(&Value::Integer(4)));
}

#[test]
fn lenient_mode_applies_the_error_policy() {
    let text = "n\n1\n2\nthree\n";
    let opts = SourceOptions {
        inference_sample_size: 3,
        ..SourceOptions::csv()
    };
    let values: Vec<_> = RowSource::delimited_text(text, opts)
        .with_error_policy(ErrorPolicy::FixedSentinel(Value::Integer(-1)))
        .load()
        .unwrap()
        .iter()
        .map(|r| r.value("n").cloned().unwrap())
        .collect();
    assert_eq!(values, vec![Value::Integer(1), Value::Integer(2), Value::Integer(-1)]);
}

#[test]
fn unclosed_quote_is_malformed() {
    let err = RowSource::delimited_path("tests/fixtures/malformed.csv", SourceOptions::csv())
        .columns()
        .unwrap_err();
    assert!(matches!(err, IngestionError::MalformedRecord { line: 3, .. }));

    // With a small sample the error surfaces during iteration, after the good row.
    let opts = SourceOptions {
        inference_sample_size: 2,
        ..SourceOptions::csv()
    };
    let mut source = RowSource::delimited_path("tests/fixtures/malformed.csv", opts);
    let mut rows = source.rows().unwrap();
    assert_eq!(rows.next().unwrap().unwrap().value("label"), Some(&Value::String("ok".into())));
    assert!(matches!(rows.next(), Some(Err(IngestionError::MalformedRecord { line: 3, .. }))));
    assert!(rows.next().is_none());
}

#[test]
fn known_types_bias_inference() {
    let mut source = RowSource::delimited_text("code,flag\n001,1\n002,0\n", SourceOptions::csv())
        .with_known_type("code", ColumnType::String)
        .with_known_type("FLAG", ColumnType::Boolean);
    assert_eq!(
        column_types(&mut source),
        vec![
            ("code".to_string(), ColumnType::String),
            ("flag".to_string(), ColumnType::Boolean),
        ]
    );
    let rows = source.load().unwrap();
    assert_eq!(rows[0].value("code"), Some(&Value::String("001".into())));
    assert_eq!(rows[1].value("flag"), Some(&Value::Boolean(false)));
}

#[test]
fn quoted_windows_path_survives_tsv_escapes() {
    let mut source = RowSource::delimited_text("path\tn\n\"C:\\new\\table\"\t1\n", SourceOptions::tsv());
    let rows = source.load().unwrap();
    assert_eq!(rows[0].value("path"), Some(&Value::String("C:\\new\\table".into())));
    assert_eq!(rows[0].value("n"), Some(&Value::Integer(1)));
}

#[test]
fn unknown_code_in_paired_indicator_column_is_kept() {
    let mut source = RowSource::delimited_text("v\tv_MVIndicator\n1\tX\n2\tQ\n", SourceOptions::tsv())
        .with_indicators(Arc::new(StaticIndicators::standard()));
    let rows = source.load().unwrap();
    assert_eq!(
        rows[0].get("v"),
        Some(&Cell::Missing(MissingValueCell {
            value: Value::Integer(1),
            indicator: Some("X".into()),
        }))
    );
    assert_eq!(rows[1].get("v").and_then(Cell::indicator), Some("Q"));

    let mut strict = RowSource::delimited_text("v\tv_MVIndicator\n1\tX\n2\tQ\n", SourceOptions::tsv().strict())
        .with_indicators(Arc::new(StaticIndicators::standard()));
    let results: Vec<_> = strict.rows().unwrap().collect();
    assert!(matches!(&results[0], Err(IngestionError::Conversion { column: 2, .. })));
    assert!(results[1].is_ok());
}
