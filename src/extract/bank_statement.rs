//! Bank statement extraction: account details, balances, and transactions.

use serde::{Deserialize, Serialize};

use super::{
    match_fields, Amount, ExtractedFields, FieldExtractor, FieldFormat, FieldRule, FieldValue,
};
use crate::blocks::{BlockGraph, Table};
use crate::document::DocumentType;

const BANK_RULES: &[FieldRule] = &[
    FieldRule {
        name: "account_number",
        phrases: &["account number", "account no", "account #", "acct"],
        format: FieldFormat::AccountNumber,
    },
    FieldRule {
        name: "routing_number",
        phrases: &["routing number", "routing", "aba"],
        format: FieldFormat::RoutingNumber,
    },
    FieldRule {
        name: "account_holder",
        phrases: &["account holder", "customer name", "account name", "name"],
        format: FieldFormat::Text,
    },
    FieldRule {
        name: "bank_name",
        phrases: &["bank name", "financial institution", "bank"],
        format: FieldFormat::Text,
    },
    FieldRule {
        name: "statement_start_date",
        phrases: &["statement period", "statement start", "period beginning"],
        format: FieldFormat::FirstDate,
    },
    FieldRule {
        name: "statement_end_date",
        phrases: &["statement period", "statement end", "period ending", "statement date", "through"],
        format: FieldFormat::LastDate,
    },
    FieldRule {
        name: "beginning_balance",
        phrases: &["beginning balance", "opening balance", "previous balance", "starting balance"],
        format: FieldFormat::Money,
    },
    FieldRule {
        name: "ending_balance",
        phrases: &["ending balance", "closing balance", "new balance", "current balance"],
        format: FieldFormat::Money,
    },
];

/// One row of a transaction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: Option<String>,
    pub description: Option<String>,
    /// Signed amount: deposits positive, withdrawals negative.
    pub amount: Option<Amount>,
    pub balance: Option<Amount>,
    /// The row as printed.
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub total_deposits: Amount,
    pub total_withdrawals: Amount,
    pub transaction_count: usize,
}

impl TransactionSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut summary = Self {
            transaction_count: transactions.len(),
            ..Self::default()
        };
        for amount in transactions.iter().filter_map(|t| t.amount) {
            if amount.is_negative() {
                summary.total_withdrawals = summary.total_withdrawals.saturating_add(amount.abs());
            } else {
                summary.total_deposits = summary.total_deposits.saturating_add(amount);
            }
        }
        summary
    }
}

/// Canonical bank statement fields plus reconstructed transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankStatementFields {
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub account_number: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub routing_number: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub account_holder: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub bank_name: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub statement_start_date: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::text_field")]
    pub statement_end_date: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub beginning_balance: Option<FieldValue>,
    #[serde(default, deserialize_with = "super::format::amount_field")]
    pub ending_balance: Option<FieldValue>,
    pub transactions: Vec<Transaction>,
    pub summary: TransactionSummary,
}

impl BankStatementFields {
    pub fn entries(&self) -> Vec<(&'static str, Option<&FieldValue>)> {
        vec![
            ("account_number", self.account_number.as_ref()),
            ("routing_number", self.routing_number.as_ref()),
            ("account_holder", self.account_holder.as_ref()),
            ("bank_name", self.bank_name.as_ref()),
            ("statement_start_date", self.statement_start_date.as_ref()),
            ("statement_end_date", self.statement_end_date.as_ref()),
            ("beginning_balance", self.beginning_balance.as_ref()),
            ("ending_balance", self.ending_balance.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Description,
    Amount,
    Credit,
    Debit,
    Balance,
}

impl Column {
    /// Classify a header cell. Order matters: "Balance Amount" is a balance.
    fn classify(header: &str) -> Option<Column> {
        let h = header.to_lowercase();
        if h.contains("balance") {
            Some(Column::Balance)
        } else if h.contains("credit") || h.contains("deposit") {
            Some(Column::Credit)
        } else if h.contains("debit") || h.contains("withdrawal") {
            Some(Column::Debit)
        } else if h.contains("date") {
            Some(Column::Date)
        } else if h.contains("amount") {
            Some(Column::Amount)
        } else if h.contains("description") || h.contains("detail") || h.contains("memo") || h.contains("payee") {
            Some(Column::Description)
        } else {
            None
        }
    }
}

/// Column layout when the header names nothing we recognize.
const POSITIONAL: [Column; 4] = [Column::Date, Column::Description, Column::Amount, Column::Balance];

fn column_layout(table: &Table) -> Vec<Option<Column>> {
    let header = table.header().unwrap_or(&[]);
    let classified: Vec<Option<Column>> = header.iter().map(|h| Column::classify(h)).collect();

    if classified.iter().any(Option::is_some) {
        classified
    } else {
        (0..header.len()).map(|i| POSITIONAL.get(i).copied()).collect()
    }
}

fn transactions_from_table(table: &Table) -> Vec<Transaction> {
    let layout = column_layout(table);

    table
        .body()
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            let mut transaction = Transaction {
                date: None,
                description: None,
                amount: None,
                balance: None,
                cells: row.clone(),
            };
            let mut credit: Option<Amount> = None;
            let mut debit: Option<Amount> = None;

            for (cell, column) in row.iter().zip(layout.iter()) {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                match column {
                    Some(Column::Date) => transaction.date = Some(cell.to_string()),
                    Some(Column::Description) => transaction.description = Some(cell.to_string()),
                    Some(Column::Amount) => transaction.amount = Amount::parse(cell),
                    Some(Column::Credit) => credit = Amount::parse(cell).map(|a| a.abs()),
                    Some(Column::Debit) => debit = Amount::parse(cell).map(|a| a.abs()),
                    Some(Column::Balance) => transaction.balance = Amount::parse(cell),
                    None => {}
                }
            }

            if transaction.amount.is_none() {
                transaction.amount = match (credit, debit) {
                    (Some(c), Some(d)) => Some(Amount::from_cents(c.cents() - d.cents())),
                    (Some(c), None) => Some(c),
                    (None, Some(d)) => Some(Amount::from_cents(-d.cents())),
                    (None, None) => None,
                };
            }

            transaction
        })
        .collect()
}

/// Extractor for bank statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct BankStatementExtractor;

impl FieldExtractor for BankStatementExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::BankStatement
    }

    fn extract(&self, graph: &BlockGraph) -> ExtractedFields {
        let pairs = graph.key_value_pairs();
        let mut found = match_fields(&pairs, BANK_RULES);

        let transactions: Vec<Transaction> = graph
            .tables()
            .iter()
            .flat_map(transactions_from_table)
            .collect();
        let summary = TransactionSummary::from_transactions(&transactions);

        ExtractedFields::BankStatement(BankStatementFields {
            account_number: found.take("account_number"),
            routing_number: found.take("routing_number"),
            account_holder: found.take("account_holder"),
            bank_name: found.take("bank_name"),
            statement_start_date: found.take("statement_start_date"),
            statement_end_date: found.take("statement_end_date"),
            beginning_balance: found.take("beginning_balance"),
            ending_balance: found.take("ending_balance"),
            transactions,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, BlockType, EntityType};

    fn table_graph(rows: &[&[&str]]) -> BlockGraph {
        let mut blocks = Vec::new();
        let mut cell_ids = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                let cell_id = format!("c{}_{}", r, c);
                let word_id = format!("w{}_{}", r, c);
                let mut cell = Block::new(cell_id.clone(), BlockType::Cell)
                    .with_cell_position(r as u32 + 1, c as u32 + 1);
                if !text.is_empty() {
                    cell = cell.with_children([word_id.clone()]);
                    blocks.push(Block::new(word_id, BlockType::Word).with_text(*text));
                }
                blocks.push(cell);
                cell_ids.push(cell_id);
            }
        }
        blocks.push(Block::new("t1", BlockType::Table).with_children(cell_ids));
        BlockGraph::build(blocks).unwrap()
    }

    fn extract(graph: &BlockGraph) -> BankStatementFields {
        match BankStatementExtractor.extract(graph) {
            ExtractedFields::BankStatement(fields) => fields,
            other => panic!("unexpected fields: {:?}", other),
        }
    }

    #[test]
    fn test_header_plus_two_rows_gives_two_transactions() {
        let graph = table_graph(&[
            &["Date", "Description", "Amount", "Balance"],
            &["01/02", "Payroll", "1,200.00", "1,700.00"],
            &["01/05", "Grocery", "-54.20", "1,645.80"],
        ]);
        let fields = extract(&graph);

        assert_eq!(fields.transactions.len(), 2);
        assert_eq!(fields.transactions[0].date.as_deref(), Some("01/02"));
        assert_eq!(fields.transactions[0].description.as_deref(), Some("Payroll"));
        assert_eq!(fields.transactions[1].amount, Some(Amount::from_cents(-5420)));
        assert_eq!(fields.transactions[1].balance, Some(Amount::from_cents(164_580)));

        assert_eq!(fields.summary.transaction_count, 2);
        assert_eq!(fields.summary.total_deposits, Amount::from_cents(120_000));
        assert_eq!(fields.summary.total_withdrawals, Amount::from_cents(5420));
    }

    #[test]
    fn test_credit_and_debit_columns() {
        let graph = table_graph(&[
            &["Posted", "Memo", "Withdrawals", "Deposits", "Running Balance"],
            &["03/01", "ATM", "40.00", "", "960.00"],
            &["03/02", "Transfer in", "", "100.00", "1,060.00"],
            &["", "", "", "", ""],
        ]);
        let fields = extract(&graph);

        assert_eq!(fields.transactions.len(), 2);
        assert_eq!(fields.transactions[0].amount, Some(Amount::from_cents(-4000)));
        assert_eq!(fields.transactions[1].amount, Some(Amount::from_cents(10_000)));
        assert_eq!(fields.transactions[1].description.as_deref(), Some("Transfer in"));
        // "Posted" is not a recognized header, so there is no date.
        assert_eq!(fields.transactions[0].date, None);
    }

    #[test]
    fn test_unrecognized_header_uses_positional_columns() {
        let graph = table_graph(&[
            &["A", "B", "C", "D"],
            &["04/01", "Coffee", "3.50", "100.00"],
        ]);
        let fields = extract(&graph);

        let t = &fields.transactions[0];
        assert_eq!(t.date.as_deref(), Some("04/01"));
        assert_eq!(t.description.as_deref(), Some("Coffee"));
        assert_eq!(t.amount, Some(Amount::from_cents(350)));
        assert_eq!(t.balance, Some(Amount::from_cents(10_000)));
    }

    #[test]
    fn test_account_fields_from_key_values() {
        let graph = BlockGraph::build(vec![
            Block::new("k1", BlockType::KeyValueSet)
                .with_entity(EntityType::Key)
                .with_children(["kw1"])
                .with_values(["v1"]),
            Block::new("kw1", BlockType::Word).with_text("Statement Period"),
            Block::new("v1", BlockType::KeyValueSet)
                .with_entity(EntityType::Value)
                .with_children(["vw1"]),
            Block::new("vw1", BlockType::Word).with_text("01/01/2024 to 01/31/2024"),
            Block::new("k2", BlockType::KeyValueSet)
                .with_entity(EntityType::Key)
                .with_children(["kw2"])
                .with_values(["v2"]),
            Block::new("kw2", BlockType::Word).with_text("Ending Balance"),
            Block::new("v2", BlockType::KeyValueSet)
                .with_entity(EntityType::Value)
                .with_children(["vw2"]),
            Block::new("vw2", BlockType::Word).with_text("$2,045.10"),
        ])
        .unwrap();
        let fields = extract(&graph);

        assert_eq!(
            fields.statement_start_date,
            Some(FieldValue::Text("01/01/2024".into()))
        );
        assert_eq!(
            fields.statement_end_date,
            Some(FieldValue::Text("01/31/2024".into()))
        );
        assert_eq!(
            fields.ending_balance,
            Some(FieldValue::Amount(Amount::from_cents(204_510)))
        );
        assert_eq!(fields.account_number, None);
        assert!(fields.transactions.is_empty());
        assert_eq!(fields.summary, TransactionSummary::default());
    }

    #[test]
    fn test_unindexed_cells_follow_header_width() {
        let rows: [[&str; 4]; 3] = [
            ["Date", "Description", "Amount", "Balance"],
            ["02/01", "Rent", "-900.00", "100.00"],
            ["02/03", "Refund", "25.00", "125.00"],
        ];
        let mut blocks = Vec::new();
        let mut cell_ids = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                let cell_id = format!("c{}_{}", r, c);
                let word_id = format!("w{}_{}", r, c);
                let mut cell = Block::new(cell_id.clone(), BlockType::Cell).with_children([word_id.clone()]);
                if r == 0 {
                    cell = cell.with_entity(EntityType::ColumnHeader);
                }
                blocks.push(cell);
                blocks.push(Block::new(word_id, BlockType::Word).with_text(*text));
                cell_ids.push(cell_id);
            }
        }
        blocks.push(Block::new("t1", BlockType::Table).with_children(cell_ids));
        let fields = extract(&BlockGraph::build(blocks).unwrap());

        assert_eq!(fields.transactions.len(), 2);
        assert_eq!(fields.transactions[0].amount, Some(Amount::from_cents(-90_000)));
        assert_eq!(fields.transactions[1].description.as_deref(), Some("Refund"));
    }

    #[test]
    fn test_account_numbers_stay_text_through_json() {
        let fields = BankStatementFields {
            account_number: Some(FieldValue::Text("0012345678".into())),
            routing_number: Some(FieldValue::Text("021000021".into())),
            ending_balance: Some(FieldValue::Amount(Amount::from_cents(204_510))),
            ..BankStatementFields::default()
        };

        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["account_number"], "0012345678");
        assert_eq!(json["ending_balance"], "2045.10");

        let back: BankStatementFields = serde_json::from_value(json).unwrap();
        assert_eq!(back, fields);
    }
}
