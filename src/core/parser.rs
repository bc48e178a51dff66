//! Bank statement CSV parsing: separator detection, header mapping and rows.

use crate::domain::model::{ParsedStatement, ReconciliationStatus, RowError, Transaction};
use crate::domain::values::{parse_amount, parse_date};
use crate::utils::error::{CfoError, Result};
use crate::utils::format::{generate_id, month_key};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;

pub const DEFAULT_MAX_ERRORS: usize = 10;

const SEPARATORS: [char; 4] = [',', ';', '\t', '|'];

const DATE_PATTERNS: &[&str] = &["data", "date", "dt", "fecha", "data_transacao", "data_movimento"];
const DESCRIPTION_PATTERNS: &[&str] = &[
    "descricao",
    "description",
    "desc",
    "historico",
    "memo",
    "observacao",
    "descricao_original",
];
const INFLOW_PATTERNS: &[&str] = &[
    "entrada",
    "credito",
    "credit",
    "receita",
    "income",
    "debito_conta",
    "valor_credito",
];
const OUTFLOW_PATTERNS: &[&str] = &[
    "saida",
    "debito",
    "debit",
    "despesa",
    "expense",
    "credito_conta",
    "valor_debito",
];
const AMOUNT_PATTERNS: &[&str] = &["valor", "amount", "quantia", "montante", "total"];
const BANK_PATTERNS: &[&str] = &["banco", "bank", "conta", "account", "instituicao", "agencia"];
const PAYEE_PATTERNS: &[&str] = &["favorecido", "beneficiario", "payee", "pagador", "destinatario"];
const CATEGORY_PATTERNS: &[&str] = &["categoria", "category", "classificacao", "tipo", "class"];
const NOTES_PATTERNS: &[&str] = &["observacoes", "notes", "notas", "obs", "comentarios", "remarks"];

/// Index of each recognised column in the header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub description: Option<usize>,
    pub inflow: Option<usize>,
    pub outflow: Option<usize>,
    pub amount: Option<usize>,
    pub bank: Option<usize>,
    pub payee: Option<usize>,
    pub category: Option<usize>,
    pub notes: Option<usize>,
}

/// Most frequent of `,` `;` tab `|` in the header; ties keep that order.
pub fn detect_separator(header_line: &str) -> char {
    let mut best = ',';
    let mut max_count = 0;
    for sep in SEPARATORS {
        let count = header_line.matches(sep).count();
        if count > max_count {
            max_count = count;
            best = sep;
        }
    }
    best
}

/// Lowercases and folds Portuguese/Spanish accents.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

fn find_column(headers: &[String], patterns: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| patterns.iter().any(|p| h.contains(p)))
}

pub fn map_columns(headers: &[String]) -> Result<ColumnMap> {
    if headers.is_empty() {
        return Err(CfoError::HeaderError {
            message: "header row is empty".to_string(),
        });
    }

    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

    let map = ColumnMap {
        date: find_column(&normalized, DATE_PATTERNS).unwrap_or(0),
        description: find_column(&normalized, DESCRIPTION_PATTERNS)
            .or((normalized.len() > 1).then_some(1)),
        inflow: find_column(&normalized, INFLOW_PATTERNS),
        outflow: find_column(&normalized, OUTFLOW_PATTERNS),
        amount: find_column(&normalized, AMOUNT_PATTERNS),
        bank: find_column(&normalized, BANK_PATTERNS),
        payee: find_column(&normalized, PAYEE_PATTERNS),
        category: find_column(&normalized, CATEGORY_PATTERNS),
        notes: find_column(&normalized, NOTES_PATTERNS),
    };

    if map.inflow.is_none() && map.outflow.is_none() && map.amount.is_none() {
        return Err(CfoError::HeaderError {
            message: "no amount columns found (Entrada, Saída or Valor)".to_string(),
        });
    }

    Ok(map)
}

fn cell(record: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| record.get(i)).unwrap_or("")
}

fn amount_cell(record: &StringRecord, index: Option<usize>) -> Result<Decimal> {
    parse_amount(cell(record, index))
}

/// Splits a row's money into (inflow, outflow), both non-negative.
fn row_amounts(record: &StringRecord, map: &ColumnMap) -> Result<(Decimal, Decimal)> {
    let use_split_columns =
        (map.inflow.is_some() && map.outflow.is_some()) || map.amount.is_none();

    if use_split_columns {
        let inflow = amount_cell(record, map.inflow)?;
        let outflow = amount_cell(record, map.outflow)?;
        if inflow < Decimal::ZERO {
            return Ok((Decimal::ZERO, outflow.abs() + inflow.abs()));
        }
        Ok((inflow, outflow.abs()))
    } else {
        let value = amount_cell(record, map.amount)?;
        if value >= Decimal::ZERO {
            Ok((value, Decimal::ZERO))
        } else {
            Ok((Decimal::ZERO, value.abs()))
        }
    }
}

/// Builds a transaction from a data row. `Ok(None)` means the row has no money.
fn row_to_transaction(record: &StringRecord, map: &ColumnMap) -> Result<Option<Transaction>> {
    let raw_date = cell(record, Some(map.date));
    let date = parse_date(raw_date)?;

    let (inflow, outflow) = row_amounts(record, map)?;
    if inflow.is_zero() && outflow.is_zero() {
        tracing::debug!("Row skipped: no amounts");
        return Ok(None);
    }

    let description = cell(record, map.description);
    let payee = cell(record, map.payee);

    Ok(Some(Transaction {
        id: generate_id(),
        date: Some(date),
        bank: non_empty_or(cell(record, map.bank), "Não informado"),
        description: non_empty_or(description, "Sem descrição"),
        payee: non_empty_or(payee, description),
        inflow,
        outflow,
        level1: cell(record, map.category).to_string(),
        status: ReconciliationStatus::Pending,
        notes: cell(record, map.notes).to_string(),
        month: month_key(date),
        ..Default::default()
    }))
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Parses a decoded statement.
///
/// Rows with fewer than three fields or no money are skipped. Unreadable rows
/// are collected until more than `max_errors` accumulate, which aborts.
pub fn parse_csv(content: &str, max_errors: usize) -> Result<ParsedStatement> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized
        .trim_start_matches('\u{feff}')
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(CfoError::HeaderError {
            message: "the CSV needs a header line and at least one data line".to_string(),
        });
    }

    let separator = detect_separator(lines[0]);
    tracing::debug!("Detected separator {:?} over {} lines", separator, lines.len());

    let cleaned = lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .delimiter(separator as u8)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(cleaned.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(header) => header?.iter().map(str::to_string).collect(),
        None => {
            return Err(CfoError::HeaderError {
                message: "missing header row".to_string(),
            })
        }
    };
    let map = map_columns(&headers)?;
    tracing::debug!("Column mapping: {:?}", map);

    let mut parsed = ParsedStatement {
        separator,
        ..Default::default()
    };

    for (index, record) in records.enumerate() {
        // header is line 1
        let line = index + 2;
        let outcome = record.map_err(CfoError::from).and_then(|record| {
            if record.len() < 3 {
                tracing::debug!("Line {} skipped: too few fields", line);
                return Ok(None);
            }
            row_to_transaction(&record, &map)
        });

        match outcome {
            Ok(Some(tx)) => parsed.transactions.push(tx),
            Ok(None) => parsed.skipped_rows += 1,
            Err(e) => {
                tracing::warn!("Error on line {}: {}", line, e);
                parsed.errors.push(RowError {
                    line,
                    message: e.to_string(),
                });
                if parsed.errors.len() > max_errors {
                    return Err(CfoError::TooManyErrors {
                        count: parsed.errors.len(),
                    });
                }
            }
        }
    }

    if parsed.transactions.is_empty() {
        return Err(CfoError::processing(
            "No valid transaction was found. Check the data format",
        ));
    }

    tracing::info!(
        "Parsed {} transactions, {} skipped, {} errors",
        parsed.transactions.len(),
        parsed.skipped_rows,
        parsed.errors.len()
    );
    Ok(parsed)
}

/// The downloadable example statement.
pub fn sample_csv() -> &'static str {
    "Data,Descrição Original,Entrada (R$),Saída (R$),Banco Origem/Destino,Status Conciliação
01/01/2025,\"Saldo Inicial\",44324.91,0,\"BS2 Bank\",\"Conciliado\"
15/01/2025,\"Prestação de serviços\",2500.00,0,\"Banco do Brasil\",\"Conciliado\"
20/01/2025,\"Aluguel escritório\",0,1200.00,\"Itaú\",\"Conciliado\"
25/01/2025,\"Internet fibra\",0,89.90,\"Nubank\",\"Pendente\"
"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn separator_detection() {
        assert_eq!(detect_separator("Data;Descrição;Valor"), ';');
        assert_eq!(detect_separator("Data\tDescrição\tValor"), '\t');
        assert_eq!(detect_separator("Data|Valor"), '|');
        assert_eq!(detect_separator("Data,Descrição;Valor"), ',');
        assert_eq!(detect_separator("Data"), ',');
    }

    #[test]
    fn header_normalization_folds_accents() {
        assert_eq!(normalize_header(" Descrição Original "), "descricao original");
        assert_eq!(normalize_header("SAÍDA (R$)"), "saida (r$)");
    }

    #[test]
    fn maps_standard_headers() {
        let map = map_columns(&headers(&[
            "Data",
            "Descrição Original",
            "Entrada (R$)",
            "Saída (R$)",
            "Banco Origem/Destino",
            "Status Conciliação",
        ]))
        .unwrap();
        assert_eq!(map.date, 0);
        assert_eq!(map.description, Some(1));
        assert_eq!(map.inflow, Some(2));
        assert_eq!(map.outflow, Some(3));
        assert_eq!(map.bank, Some(4));
        assert_eq!(map.amount, None);
    }

    #[test]
    fn maps_english_headers_with_fallbacks() {
        let map = map_columns(&headers(&["When", "What", "Amount"])).unwrap();
        assert_eq!(map.date, 0);
        assert_eq!(map.description, Some(1));
        assert_eq!(map.amount, Some(2));
    }

    #[test]
    fn missing_amount_columns_is_header_error() {
        let err = map_columns(&headers(&["Data", "Descrição", "Banco"])).unwrap_err();
        assert!(matches!(err, CfoError::HeaderError { .. }));
    }

    #[test]
    fn parses_sample_statement() {
        let parsed = parse_csv(sample_csv(), DEFAULT_MAX_ERRORS).unwrap();
        assert_eq!(parsed.separator, ',');
        assert_eq!(parsed.transactions.len(), 4);

        let first = &parsed.transactions[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(first.description, "Saldo Inicial");
        assert_eq!(first.payee, "Saldo Inicial");
        assert_eq!(first.inflow, dec("44324.91"));
        assert_eq!(first.bank, "BS2 Bank");
        assert_eq!(first.month, "2025-01");
        // the sample's status column is ignored: every import starts pending
        assert!(parsed
            .transactions
            .iter()
            .all(|t| t.status == ReconciliationStatus::Pending));
    }

    #[test]
    fn semicolon_brazilian_format_with_quotes() {
        let content = "Data;Histórico;Valor\r\n\
                       05/02/2025;\"Pagamento; \"\"boleto\"\"\";-1.234,56\r\n\
                       06/02/2025;Depósito;R$ 300,00\r\n";
        let parsed = parse_csv(content, DEFAULT_MAX_ERRORS).unwrap();
        assert_eq!(parsed.separator, ';');
        assert_eq!(parsed.transactions.len(), 2);

        let debit = &parsed.transactions[0];
        assert_eq!(debit.description, "Pagamento; \"boleto\"");
        assert_eq!(debit.inflow, Decimal::ZERO);
        assert_eq!(debit.outflow, dec("1234.56"));
        assert_eq!(debit.bank, "Não informado");

        assert_eq!(parsed.transactions[1].inflow, dec("300.00"));
    }

    #[test]
    fn skips_short_and_zero_rows() {
        let content = "Data,Descrição,Entrada,Saída\n\
                       01/03/2025,Vazio,0,0\n\
                       02/03/2025,x\n\
                       03/03/2025,Venda,10,0\n";
        let parsed = parse_csv(content, DEFAULT_MAX_ERRORS).unwrap();
        assert_eq!(parsed.transactions.len(), 1);
        assert_eq!(parsed.skipped_rows, 2);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn bad_rows_are_reported_with_line_numbers() {
        let content = "Data,Descrição,Entrada,Saída\n\
                       31/02/2025,Ruim,10,0\n\
                       01/03/2025,Boa,10,0\n";
        let parsed = parse_csv(content, DEFAULT_MAX_ERRORS).unwrap();
        assert_eq!(parsed.transactions.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, 2);
    }

    #[test]
    fn too_many_errors_aborts() {
        let mut content = String::from("Data,Descrição,Entrada,Saída\n");
        for _ in 0..4 {
            content.push_str("not-a-date,x,1,0\n");
        }
        content.push_str("01/01/2025,ok,1,0\n");
        let err = parse_csv(&content, 3).unwrap_err();
        assert!(matches!(err, CfoError::TooManyErrors { count: 4 }));
    }

    #[test]
    fn no_transactions_is_an_error() {
        let content = "Data,Descrição,Entrada,Saída\n01/01/2025,x,0,0\n";
        assert!(matches!(
            parse_csv(content, DEFAULT_MAX_ERRORS),
            Err(CfoError::ProcessingError { .. })
        ));
        assert!(parse_csv("Data,Valor\n", DEFAULT_MAX_ERRORS).is_err());
    }
}
