//! Statement conversion to the standard ledger layout, plus ZIP bundles.

use crate::core::encoding::{decode, validate_upload, DEFAULT_MAX_FILE_SIZE_MB};
use crate::core::parser::{parse_csv, DEFAULT_MAX_ERRORS};
use crate::domain::model::{columns, Transaction};
use crate::utils::error::{CfoError, Result};
use crate::utils::format::amount_str;
use std::io::Write;
use std::path::Path;
use zip::write::{FileOptions, ZipWriter};

/// Column order of a converted statement. The month column is spelled with
/// its accent here, unlike the stored field.
pub const STANDARD_HEADERS: [&str; 14] = [
    columns::DATE,
    columns::DESCRIPTION,
    columns::PAYEE,
    columns::INFLOW,
    columns::OUTFLOW,
    columns::BANK,
    columns::LEVEL1,
    columns::LEVEL2,
    columns::LEVEL3,
    columns::COST_CENTER,
    columns::STATUS,
    columns::NOTES,
    columns::CONTRACT_NOTE,
    "Mês",
];

pub const BUNDLE_STEM: &str = "transacoes";

#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub name: String,
    pub content: String,
    pub transactions: usize,
    pub skipped_rows: usize,
}

fn row(tx: &Transaction) -> [String; 14] {
    [
        tx.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        tx.description.clone(),
        tx.payee.clone(),
        amount_str(tx.inflow),
        amount_str(tx.outflow),
        tx.bank.clone(),
        tx.level1.clone(),
        tx.level2.clone(),
        tx.level3.clone(),
        tx.cost_center.clone(),
        tx.status.to_string(),
        tx.notes.clone(),
        tx.contract_note.clone(),
        tx.month_key().unwrap_or_default(),
    ]
}

fn write_delimited(transactions: &[Transaction], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(STANDARD_HEADERS)?;
    for tx in transactions {
        writer.write_record(row(tx))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CfoError::processing(format!("failed to flush converted rows: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| CfoError::processing(format!("converted rows are not UTF-8: {}", e)))
}

/// Standard-layout CSV, quoting only fields that need it.
pub fn to_standard_csv(transactions: &[Transaction]) -> Result<String> {
    write_delimited(transactions, b',')
}

pub fn to_standard_tsv(transactions: &[Transaction]) -> Result<String> {
    write_delimited(transactions, b'\t')
}

pub fn converted_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("arquivo");
    format!("{}_convertido.csv", stem)
}

/// Parses a bank statement with the import rules and re-emits it in the
/// standard layout.
pub fn convert_csv(name: &str, bytes: &[u8]) -> Result<ConvertedFile> {
    validate_upload(name, bytes.len() as u64, DEFAULT_MAX_FILE_SIZE_MB)?;
    let text = decode(bytes)?;
    let parsed = parse_csv(&text, DEFAULT_MAX_ERRORS)?;
    let content = to_standard_csv(&parsed.transactions)?;

    tracing::info!(
        "Converted {} into {} rows",
        name,
        parsed.transactions.len()
    );
    Ok(ConvertedFile {
        name: converted_name(name),
        content,
        transactions: parsed.transactions.len(),
        skipped_rows: parsed.skipped_rows,
    })
}

/// ZIP with the ledger as CSV, TSV and JSON.
pub fn bundle(transactions: &[Transaction]) -> Result<Vec<u8>> {
    let csv_output = to_standard_csv(transactions)?;
    let tsv_output = to_standard_tsv(transactions)?;
    let json_output = serde_json::to_string_pretty(transactions)?;

    tracing::debug!("Creating ZIP bundle for {} transactions", transactions.len());

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    zip.start_file::<_, ()>(format!("{}.csv", BUNDLE_STEM), FileOptions::default())?;
    zip.write_all(csv_output.as_bytes())?;

    zip.start_file::<_, ()>(format!("{}.tsv", BUNDLE_STEM), FileOptions::default())?;
    zip.write_all(tsv_output.as_bytes())?;

    zip.start_file::<_, ()>(format!("{}.json", BUNDLE_STEM), FileOptions::default())?;
    zip.write_all(json_output.as_bytes())?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::sample_csv;
    use crate::domain::model::AppData;
    use std::io::Read;

    #[test]
    fn converts_sample_statement() {
        let converted = convert_csv("extrato.csv", sample_csv().as_bytes()).unwrap();
        assert_eq!(converted.name, "extrato_convertido.csv");
        assert_eq!(converted.transactions, 4);

        let mut lines = converted.content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Data,Descrição Original,Favorecido / Pagador Padronizado,Entrada (R$),Saída (R$),\
             Banco Origem/Destino,Classificação Nível 1,Classificação Nível 2,Classificação Nível 3,\
             Centro de Custo,Status Conciliação,Notas,Contrato/Nota?,Mês"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2025-01-01,Saldo Inicial,Saldo Inicial,44324.91,0.00,BS2 Bank,,,,,Pendente,,,2025-01"
        );
    }

    #[test]
    fn escapes_only_when_needed() {
        let tx = Transaction {
            description: "Compra \"especial\", parcela 1".to_string(),
            notes: "linha 1\nlinha 2".to_string(),
            payee: "Loja".to_string(),
            ..Default::default()
        };
        let csv = to_standard_csv(&[tx]).unwrap();
        assert!(csv.contains(",\"Compra \"\"especial\"\", parcela 1\",Loja,"));
        assert!(csv.contains("\"linha 1\nlinha 2\""));
    }

    #[test]
    fn rejects_other_formats() {
        let excel = convert_csv("extrato.xlsx", b"data").unwrap_err();
        assert!(excel.to_string().contains("Excel"));
        assert!(convert_csv("extrato.pdf", b"data").is_err());
    }

    #[test]
    fn output_name() {
        assert_eq!(converted_name("dir/jan.CSV"), "jan_convertido.csv");
        assert_eq!(converted_name("extrato"), "extrato_convertido.csv");
    }

    #[test]
    fn bundle_has_three_entries() {
        let data = AppData::example();
        let bytes = bundle(&data.transactions).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut json = String::new();
        archive
            .by_name("transacoes.json")
            .unwrap()
            .read_to_string(&mut json)
            .unwrap();
        let parsed: Vec<Transaction> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 5);

        let mut tsv = String::new();
        archive
            .by_name("transacoes.tsv")
            .unwrap()
            .read_to_string(&mut tsv)
            .unwrap();
        assert!(tsv.starts_with("Data\tDescrição Original\t"));
    }
}
