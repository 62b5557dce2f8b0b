//! End-to-end runs over the bundled sample trades and mappings.

use chrono::{TimeZone, Utc};
use mifid_txgen::{
    check_well_formed, BuildError, EmptyInputPolicy, GeneratorError, GeneratorOptions, MapError,
    MappingConfig, ReportGenerator, RunContext, Stage, TabularReader,
};
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const FIRM_LEI: &str = "5493001KJTIIGC8Y1R12";
const TO_LEI: &str = "529900T8BM49AURSDO55";

fn asset(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn context() -> RunContext {
    RunContext::default()
        .with_var("FIRM_LEI", FIRM_LEI)
        .with_var("TO_LEI", TO_LEI)
        .with_now(Utc.with_ymd_and_hms(2024, 1, 9, 8, 0, 0).unwrap())
        .with_message_id("0f3c2a")
}

fn generator(mapping: &str) -> ReportGenerator {
    ReportGenerator::from_path(asset(mapping), GeneratorOptions::default()).unwrap()
}

fn write_csv(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("trades.csv");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_sample_report() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("report.xml");

    let report = generator("config/mapping.json")
        .generate(&asset("samples/trades.csv"), &out, &context())
        .unwrap();
    assert_eq!(report.records, 3);
    assert!(report.validation.is_none());

    let xml = fs::read_to_string(&out).unwrap();
    assert_eq!(report.bytes, xml.len());
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    check_well_formed(&xml).unwrap();

    // input order kept
    let first = xml.find("TX-0001").unwrap();
    let second = xml.find("TX-0002").unwrap();
    let third = xml.find("TX-0003").unwrap();
    assert!(first < second && second < third);

    assert_eq!(xml.matches("<rep:Tx>").count(), 3 + 3);
    assert!(xml.contains("<rep:TradDt>2024-01-05</rep:TradDt>"));
    assert!(xml.contains("<rep:Id>US0378331005</rep:Id>"));
    assert!(xml.contains("<rep:Amt Ccy=\"EUR\">45.1</rep:Amt>"));
    assert_eq!(
        xml.matches(&format!("<rep:ExctgPty>{FIRM_LEI}</rep:ExctgPty>")).count(),
        3
    );
    // empty venue on the third row is skipped
    assert_eq!(xml.matches("<rep:TradVn>").count(), 2);
}

#[test]
fn test_child_order_overrides_rule_order() {
    let xml = generator("config/mapping.json")
        .render(&asset("samples/trades.csv"), &context())
        .unwrap()
        .xml;
    let date = xml.find("<rep:TradDt>").unwrap();
    let capacity = xml.find("<rep:TradgCpcty>").unwrap();
    let venue = xml.find("<rep:TradVn>").unwrap();
    assert!(date < capacity && capacity < venue);

    let tx_id = xml.find("<rep:TxId>").unwrap();
    let executing = xml.find("<rep:ExctgPty>").unwrap();
    let indicator = xml.find("<rep:InvstmtPtyInd>").unwrap();
    assert!(tx_id < executing && executing < indicator);
}

#[rstest]
#[case("config/mapping.json")]
#[case("config/mapping_iso.json")]
fn test_rendering_is_deterministic(#[case] mapping: &str) {
    let csv = asset("samples/trades.csv");
    let first = generator(mapping).render(&csv, &context()).unwrap();
    let second = generator(mapping).render(&csv, &context()).unwrap();
    assert_eq!(first.xml, second.xml);
}

#[test]
fn test_iso_envelope() {
    let xml = generator("config/mapping_iso.json")
        .render(&asset("samples/trades.csv"), &context())
        .unwrap()
        .xml;
    check_well_formed(&xml).unwrap();

    let body = xml.lines().nth(1).unwrap();
    assert!(body.starts_with("<head003:BizData"));
    // declarations only on the outermost element
    for prefix in ["head003", "head001", "msg", "xsi"] {
        assert_eq!(xml.matches(&format!("xmlns:{prefix}=")).count(), 1, "{prefix}");
    }
    assert!(xml.contains("xsi:schemaLocation=\"urn:iso:std:iso:20022:tech:xsd:head.003.001.01"));
    assert!(xml.contains(&format!("<head001:Id>{FIRM_LEI}</head001:Id>")));
    assert!(xml.contains(&format!("<head001:Id>{TO_LEI}</head001:Id>")));
    assert!(xml.contains("<head001:BizMsgIdr>mf-0f3c2a</head001:BizMsgIdr>"));
    assert!(xml.contains("<head001:MsgDefIdr>auth.016.001.01</head001:MsgDefIdr>"));
    assert!(xml.contains("<head001:CreDt>2024-01-09T08:00:00Z</head001:CreDt>"));

    let pyld = xml.find("<head003:Pyld>").unwrap();
    let container = xml.find("<msg:FinInstrmRptgTxRpt>").unwrap();
    assert!(pyld < container);
    assert_eq!(xml.matches("<msg:TxId>").count(), 3);
}

#[rstest]
#[case("FIRM_LEI")]
#[case("TO_LEI")]
fn test_missing_envelope_lei_writes_nothing(#[case] absent: &str) {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("report.xml");
    let mut ctx = RunContext::default().with_message_id("0f3c2a");
    for (name, value) in [("FIRM_LEI", FIRM_LEI), ("TO_LEI", TO_LEI)] {
        if name != absent {
            ctx = ctx.with_var(name, value);
        }
    }

    let mut generator = generator("config/mapping_iso.json");
    let err = generator
        .generate(&asset("samples/trades.csv"), &out, &ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        GeneratorError::Build(BuildError::MissingEnvironment(ref var)) if var == absent
    ));
    assert!(!out.exists());
    assert!(matches!(generator.stage(), Stage::Failed { .. }));
}

#[test]
fn test_invalid_envelope_lei() {
    let ctx = context().with_var("TO_LEI", "NOT-AN-LEI");
    let err = generator("config/mapping_iso.json")
        .render(&asset("samples/trades.csv"), &ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        GeneratorError::Build(BuildError::InvalidIdentifier { ref name, .. }) if name == "TO_LEI"
    ));
}

#[test]
fn test_const_rule_without_firm_lei_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("report.xml");
    let ctx = RunContext::default().with_message_id("0f3c2a");

    let err = generator("config/mapping.json")
        .generate(&asset("samples/trades.csv"), &out, &ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        GeneratorError::Map(MapError::Macro {
            row: 1,
            source: BuildError::MissingEnvironment(ref var),
            ..
        }) if var == "FIRM_LEI"
    ));
    assert!(!out.exists());
}

#[test]
fn test_control_character_in_input() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(
        &dir,
        "tx_id,trade_date,isin,quantity,price,currency,buyer_lei,seller_lei,venue,capacity\n\
         TX\u{1}1,2024-01-05,FR0000120271,1,2,EUR,5493001KJTIIGC8Y1R12,529900T8BM49AURSDO55,XPAR,DEAL\n",
    );
    let out = dir.path().join("report.xml");

    let err = generator("config/mapping.json")
        .generate(&csv, &out, &context())
        .unwrap_err();
    assert!(matches!(
        err,
        GeneratorError::Map(MapError::InvalidCharacter { row: 1, ref column, character: '\u{1}' })
            if column == "tx_id"
    ));
    assert!(!out.exists());
}

#[test]
fn test_missing_column_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(
        &dir,
        "tx_id,trade_date,isin,quantity,price,currency,seller_lei,venue,capacity\n\
         TX-1,2024-01-05,FR0000120271,1,2,EUR,529900T8BM49AURSDO55,XPAR,DEAL\n",
    );
    let out = dir.path().join("report.xml");

    let err = generator("config/mapping.json")
        .generate(&csv, &out, &context())
        .unwrap_err();
    assert!(matches!(
        err,
        GeneratorError::Map(MapError::MissingField { ref column, row: 1 }) if column == "buyer_lei"
    ));
    assert!(!out.exists());
}

#[test]
fn test_bad_row_is_reported_with_its_index() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(
        &dir,
        "tx_id,trade_date,isin,quantity,price,currency,buyer_lei,seller_lei,venue,capacity\n\
         TX-1,2024-01-05,FR0000120271,1,2,EUR,5493001KJTIIGC8Y1R12,529900T8BM49AURSDO55,XPAR,DEAL\n\
         TX-2,2024-01-05,FR0000120271,1,2,EUR,5493001KJTIIGC8Y1R13,529900T8BM49AURSDO55,XPAR,DEAL\n\
         TX-3,not a date,FR0000120271,1,2,EUR,5493001KJTIIGC8Y1R12,529900T8BM49AURSDO55,XPAR,DEAL\n",
    );

    let err = generator("config/mapping.json")
        .render(&csv, &context())
        .unwrap_err();
    assert!(matches!(
        err,
        GeneratorError::Map(MapError::InvalidIdentifier { row: 2, ref column, .. })
            if column == "buyer_lei"
    ));
}

#[test]
fn test_last_write_wins() {
    let mapping = serde_json::json!({
        "namespaces": { "rep": "urn:test:report" },
        "root": { "qname": "rep:Report" },
        "record_element": "rep:Tx",
        "fields": [
            {"from": "a", "to": "rep:Id"},
            {"from": "b", "to": "rep:Id"},
            {"from": "a", "to": "rep:Amt@Ccy"},
            {"from": "b", "to": "rep:Amt@Ccy"}
        ]
    });
    let config = MappingConfig::from_json(&mapping.to_string()).unwrap();
    let reader = TabularReader::from_bytes(b"a,b\nfirst,second\n").unwrap();

    let xml = ReportGenerator::new(config, GeneratorOptions::default())
        .render_reader(&reader, &context())
        .unwrap()
        .xml;
    assert!(xml.contains("<rep:Id>second</rep:Id>"));
    assert!(xml.contains("<rep:Amt Ccy=\"second\"/>"));
    assert!(!xml.contains("first"));
}

#[rstest]
#[case(EmptyInputPolicy::RequireRecords, false)]
#[case(EmptyInputPolicy::Allow, true)]
fn test_header_only_input(#[case] policy: EmptyInputPolicy, #[case] written: bool) {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(
        &dir,
        "tx_id;trade_date;isin;quantity;price;currency;buyer_lei;seller_lei;venue;capacity\n",
    );
    let out = dir.path().join("report.xml");
    let options = GeneratorOptions {
        empty_input: policy,
        ..GeneratorOptions::default()
    };

    let result = ReportGenerator::from_path(asset("config/mapping.json"), options)
        .unwrap()
        .generate(&csv, &out, &context());

    assert_eq!(out.exists(), written);
    if written {
        let report = result.unwrap();
        assert_eq!(report.records, 0);
        let xml = fs::read_to_string(&out).unwrap();
        assert!(xml.contains("<rep:FinInstrmRptgTxRpt/>"));
    } else {
        assert!(matches!(result.unwrap_err(), GeneratorError::EmptyInput));
    }
}
