//! End-to-end pipeline runs against a scripted analyzer.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use docfields::analyzer::{AdapterRef, AnalysisRequest, AnalyzerError, DocumentAnalyzer, FeatureType};
use docfields::extract::{Amount, FieldValue};
use docfields::pipeline::{
    ExtractionMethod, FailureKind, FeaturePolicy, PipelineState, ProcessingPipeline,
    ServiceBinding,
};
use docfields::{DocumentType, ExtractedFields};

/// Answers each call with the next scripted outcome and records requests.
struct ScriptedAnalyzer {
    outcomes: Mutex<Vec<Result<Value, AnalyzerError>>>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedAnalyzer {
    fn new(outcomes: Vec<Result<Value, AnalyzerError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn always(payload: Value, calls: usize) -> Arc<Self> {
        Self::new((0..calls).map(|_| Ok(payload.clone())).collect())
    }

    fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentAnalyzer for ScriptedAnalyzer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, _document: &[u8], request: &AnalysisRequest) -> Result<Value, AnalyzerError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(AnalyzerError::fatal("no scripted outcome left")))
    }
}

/// KEY/VALUE pair with WORD children, as AnalyzeDocument returns them.
fn form_field(blocks: &mut Vec<Value>, n: usize, key: &str, value: &str) {
    let key_words: Vec<String> = key
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let id = format!("kw{}-{}", n, i);
            blocks.push(json!({"Id": id, "BlockType": "WORD", "Text": word, "Confidence": 99.0}));
            id
        })
        .collect();
    let value_words: Vec<String> = value
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let id = format!("vw{}-{}", n, i);
            blocks.push(json!({"Id": id, "BlockType": "WORD", "Text": word, "Confidence": 97.0}));
            id
        })
        .collect();

    blocks.push(json!({
        "Id": format!("k{}", n),
        "BlockType": "KEY_VALUE_SET",
        "EntityTypes": ["KEY"],
        "Confidence": 95.0,
        "Geometry": {"BoundingBox": {"Width": 0.1, "Height": 0.02, "Left": 0.1, "Top": 0.1}},
        "Relationships": [
            {"Type": "CHILD", "Ids": key_words},
            {"Type": "VALUE", "Ids": [format!("v{}", n)]}
        ]
    }));
    blocks.push(json!({
        "Id": format!("v{}", n),
        "BlockType": "KEY_VALUE_SET",
        "EntityTypes": ["VALUE"],
        "Confidence": 93.0,
        "Relationships": [{"Type": "CHILD", "Ids": value_words}]
    }));
}

fn w2_response(ssn: &str) -> Value {
    let mut blocks = vec![json!({"Id": "page-1", "BlockType": "PAGE"})];
    form_field(&mut blocks, 0, "a Employee's social security number", ssn);
    form_field(&mut blocks, 1, "b Employer identification number (EIN)", "12-3456789");
    form_field(&mut blocks, 2, "1 Wages, tips, other compensation", "$48,500.00");
    form_field(&mut blocks, 3, "2 Federal income tax withheld", "6,200.00");
    json!({"DocumentMetadata": {"Pages": 1}, "Blocks": blocks})
}

fn bank_response() -> Value {
    let rows = [
        ["Date", "Description", "Amount", "Balance"],
        ["01/03/2024", "Direct deposit", "2,500.00", "3,000.00"],
        ["01/09/2024", "Rent", "-1,200.00", "1,800.00"],
    ];

    let mut blocks = Vec::new();
    let mut cell_ids = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        for (c, text) in row.iter().enumerate() {
            let word_id = format!("w{}{}", r, c);
            let cell_id = format!("c{}{}", r, c);
            blocks.push(json!({"Id": word_id, "BlockType": "WORD", "Text": text, "Confidence": 98.0}));
            blocks.push(json!({
                "Id": cell_id,
                "BlockType": "CELL",
                "RowIndex": r + 1,
                "ColumnIndex": c + 1,
                "Confidence": 90.0,
                "Relationships": [{"Type": "CHILD", "Ids": [word_id]}]
            }));
            cell_ids.push(cell_id);
        }
    }
    blocks.push(json!({
        "Id": "table-1",
        "BlockType": "TABLE",
        "Confidence": 99.0,
        "Relationships": [{"Type": "CHILD", "Ids": cell_ids}]
    }));
    form_field(&mut blocks, 0, "Account Number", "XXXX-4321");
    form_field(&mut blocks, 1, "Routing Number", "021000021");
    form_field(&mut blocks, 2, "Beginning Balance", "500.00");

    json!({"Blocks": blocks})
}

fn w2_fields(fields: &ExtractedFields) -> &docfields::extract::W2Fields {
    match fields {
        ExtractedFields::W2(w2) => w2,
        other => panic!("expected W-2 fields, got {:?}", other.document_type()),
    }
}

#[tokio::test]
async fn w2_happy_path() {
    let analyzer = ScriptedAnalyzer::always(w2_response("123-45-6789"), 1);
    let binding = ServiceBinding::new(analyzer.clone());

    let result = ProcessingPipeline::default()
        .process(b"%PDF-1.7", DocumentType::W2, &binding)
        .await
        .unwrap();

    let w2 = w2_fields(&result.fields);
    assert_eq!(w2.employee_ssn, Some(FieldValue::Text("123-45-6789".into())));
    assert_eq!(w2.employer_ein, Some(FieldValue::Text("12-3456789".into())));
    assert_eq!(w2.wages, Some(FieldValue::Amount(Amount::from_cents(4_850_000))));
    assert_eq!(w2.federal_tax_withheld, Some(FieldValue::Amount(Amount::from_cents(620_000))));
    assert_eq!(w2.medicare_wages, None);

    assert_eq!(result.extraction_method, ExtractionMethod::Standard);
    assert_eq!(result.document_type, DocumentType::W2);
    assert_eq!(result.block_count, analyzer_blocks(&w2_response("123-45-6789")));
    assert!(!result.confidence.no_data);
}

#[tokio::test]
async fn w2_invalid_ssn_is_null() {
    let analyzer = ScriptedAnalyzer::always(w2_response("not-a-number"), 1);
    let binding = ServiceBinding::new(analyzer);

    let result = ProcessingPipeline::default()
        .process(b"doc", DocumentType::W2, &binding)
        .await
        .unwrap();

    let w2 = w2_fields(&result.fields);
    assert_eq!(w2.employee_ssn, None);
    assert!(w2.employer_ein.is_some());
}

#[tokio::test]
async fn adapter_not_found_falls_back() {
    let analyzer = ScriptedAnalyzer::new(vec![
        Err(AnalyzerError::adapter_not_found("Adapter w2-prod not found")),
        Ok(w2_response("123-45-6789")),
    ]);
    let binding = ServiceBinding::new(analyzer.clone()).with_adapter(Some(AdapterRef::new("w2-prod", "1")));

    let result = ProcessingPipeline::default()
        .process(b"doc", DocumentType::W2, &binding)
        .await
        .unwrap();

    assert_eq!(result.extraction_method, ExtractionMethod::Fallback);
    assert_eq!(result.adapter_id, None);
    assert_eq!(
        result.states,
        vec![
            PipelineState::Idle,
            PipelineState::Invoking,
            PipelineState::FallbackInvoking,
            PipelineState::Extracting,
            PipelineState::Succeeded,
        ]
    );
    assert!(result.fallback_reason.is_some());
    assert!(w2_fields(&result.fields).employee_ssn.is_some());

    let requests = analyzer.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].adapter, Some(AdapterRef::new("w2-prod", "1")));
    assert!(requests[0].features.contains(&FeatureType::Layout));
    assert_eq!(requests[1].adapter, None);
    assert_eq!(requests[1].feature_list(), "FORMS+TABLES");
}

#[tokio::test]
async fn fatal_error_surfaces() {
    let analyzer = ScriptedAnalyzer::new(vec![Err(AnalyzerError::fatal("UnsupportedDocumentException"))]);
    let binding = ServiceBinding::new(analyzer.clone());

    let failure = ProcessingPipeline::default()
        .process(b"doc", DocumentType::W2, &binding)
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::Fatal);
    assert_eq!(failure.message, "UnsupportedDocumentException");
    assert_eq!(failure.states.last(), Some(&PipelineState::Failed));
    assert_eq!(analyzer.requests().len(), 1);
}

#[tokio::test]
async fn failing_fallback_surfaces_its_own_error() {
    let analyzer = ScriptedAnalyzer::new(vec![
        Err(AnalyzerError::feature_unavailable("LAYOUT unavailable")),
        Err(AnalyzerError::transient("ThrottlingException")),
    ]);
    let binding = ServiceBinding::new(analyzer.clone());

    let failure = ProcessingPipeline::default()
        .process(b"doc", DocumentType::W2, &binding)
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::Transient);
    assert_eq!(failure.message, "ThrottlingException");
    assert_eq!(
        failure.states,
        vec![
            PipelineState::Idle,
            PipelineState::Invoking,
            PipelineState::FallbackInvoking,
            PipelineState::Failed,
        ]
    );
    assert_eq!(analyzer.requests().len(), 2);
}

#[tokio::test]
async fn bank_statement_transactions() {
    let analyzer = ScriptedAnalyzer::always(bank_response(), 1);
    let binding = ServiceBinding::new(analyzer);

    let result = ProcessingPipeline::default()
        .process(b"doc", DocumentType::BankStatement, &binding)
        .await
        .unwrap();

    let ExtractedFields::BankStatement(bank) = &result.fields else {
        panic!("expected bank statement fields");
    };
    assert_eq!(bank.transactions.len(), 2);
    assert_eq!(bank.summary.transaction_count, 2);
    assert_eq!(bank.summary.total_deposits, Amount::from_cents(250_000));
    assert_eq!(bank.summary.total_withdrawals, Amount::from_cents(120_000));
    assert_eq!(bank.account_number, Some(FieldValue::Text("XXXX4321".into())));
    assert_eq!(bank.routing_number, Some(FieldValue::Text("021000021".into())));
    assert_eq!(bank.beginning_balance, Some(FieldValue::Amount(Amount::from_cents(50_000))));
}

#[tokio::test]
async fn empty_form_gives_all_null_fields() {
    let payload = json!({"Blocks": [
        {"Id": "p", "BlockType": "PAGE"},
        {"Id": "l", "BlockType": "LINE", "Text": "Form W-2 Wage and Tax Statement", "Confidence": 88.0}
    ]});
    let analyzer = ScriptedAnalyzer::always(payload, 1);
    let binding = ServiceBinding::new(analyzer);

    let result = ProcessingPipeline::default()
        .process(b"doc", DocumentType::W2, &binding)
        .await
        .unwrap();

    assert!(result.fields.canonical_fields().iter().all(|(_, v)| v.is_none()));
    let json = serde_json::to_value(&result.fields).unwrap();
    assert_eq!(json["document_type"], "w2");
    assert!(json["employee_ssn"].is_null());
}

#[tokio::test]
async fn extraction_is_idempotent() {
    let analyzer = ScriptedAnalyzer::always(bank_response(), 2);
    let binding = ServiceBinding::new(analyzer);
    let pipeline = ProcessingPipeline::new(FeaturePolicy::default());

    let first = pipeline.process(b"doc", DocumentType::BankStatement, &binding).await.unwrap();
    let second = pipeline.process(b"doc", DocumentType::BankStatement, &binding).await.unwrap();

    assert_eq!(first.fields, second.fields);
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.document_sha256, second.document_sha256);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn malformed_payloads_fail_cleanly() {
    let payloads = [
        json!({"Pages": 1}),
        json!({"Blocks": "nope"}),
        json!({"Blocks": [{"Id": "a", "BlockType": "WORD"}, {"Id": "a", "BlockType": "WORD"}]}),
    ];

    for payload in payloads {
        let analyzer = ScriptedAnalyzer::always(payload, 1);
        let binding = ServiceBinding::new(analyzer);
        let failure = ProcessingPipeline::default()
            .process(b"doc", DocumentType::Generic, &binding)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::MalformedResponse);
    }
}

#[tokio::test]
async fn result_serializes_with_tags() {
    let analyzer = ScriptedAnalyzer::always(w2_response("123-45-6789"), 1);
    let binding = ServiceBinding::new(analyzer);

    let result = ProcessingPipeline::default()
        .process(b"doc", DocumentType::W2, &binding)
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["extraction_method"], "standard");
    assert_eq!(json["fields"]["document_type"], "w2");
    assert_eq!(json["fields"]["wages"], "48500.00");
    assert_eq!(json["states"][3], "succeeded");
    assert_eq!(json["confidence"]["quality"], "excellent");
}

fn analyzer_blocks(payload: &Value) -> usize {
    payload["Blocks"].as_array().map(|b| b.len()).unwrap_or(0)
}
