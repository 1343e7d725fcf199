// src/import.rs
//
// Spreadsheet ingestion: CSV rows -> NewContact.
//
// Headers are matched loosely ("LinkedIn URL", "linkedinUrl" and
// "linkedin_url" are the same column). Row-level problems are returned per
// row; only a file that cannot be read at all is an error.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::models::{NewContact, Variant};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("spreadsheet has no LinkedIn URL column")]
    MissingUrlColumn,

    #[error("spreadsheet has neither a first-name nor a full-name column")]
    MissingNameColumn,

    #[error("could not read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet download failed: {0}")]
    Download(String),

    #[error("campaign has no spreadsheet_url")]
    NoSpreadsheet,
}

/// One data row, with the line it came from.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub line: usize,
    pub contact: Result<NewContact, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    LinkedinUrl,
    FirstName,
    LastName,
    FullName,
    Company,
    JobTitle,
    Variant,
}

/// Lowercase and drop everything that is not a letter or digit.
fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn column_for(header: &str) -> Option<Column> {
    let column = match header_key(header).as_str() {
        "linkedinurl" | "linkedin" | "linkedinprofile" | "linkedinprofileurl" | "profileurl"
        | "profile" | "url" => Column::LinkedinUrl,
        "firstname" | "first" | "givenname" => Column::FirstName,
        "lastname" | "last" | "surname" | "familyname" => Column::LastName,
        "name" | "fullname" => Column::FullName,
        "company" | "companyname" | "organization" | "organisation" | "employer" => Column::Company,
        "jobtitle" | "title" | "position" | "role" => Column::JobTitle,
        "variant" | "messagevariant" => Column::Variant,
        _ => return None,
    };
    Some(column)
}

/// Header position for every recognised column; first occurrence wins.
struct ColumnMap(Vec<(Column, usize)>);

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut map: Vec<(Column, usize)> = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = column_for(header) {
                if !map.iter().any(|(c, _)| *c == column) {
                    map.push((column, idx));
                }
            }
        }
        ColumnMap(map)
    }

    fn has(&self, column: Column) -> bool {
        self.0.iter().any(|(c, _)| *c == column)
    }

    fn get<'r>(&self, record: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.0
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, idx)| record.get(*idx))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Split "Ada Lovelace King" into ("Ada", Some("Lovelace King")).
fn split_full_name(full: &str) -> (String, Option<String>) {
    match full.trim().split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), Some(rest.trim().to_string()).filter(|r| !r.is_empty())),
        None => (full.trim().to_string(), None),
    }
}

fn row_to_contact(columns: &ColumnMap, record: &StringRecord) -> Result<NewContact, String> {
    let linkedin_url = columns
        .get(record, Column::LinkedinUrl)
        .ok_or_else(|| "missing LinkedIn URL".to_string())?
        .to_string();

    let (first_name, last_name) = match columns.get(record, Column::FirstName) {
        Some(first) => (
            first.to_string(),
            columns.get(record, Column::LastName).map(str::to_string),
        ),
        None => {
            let full = columns
                .get(record, Column::FullName)
                .ok_or_else(|| "missing first name".to_string())?;
            let (first, last) = split_full_name(full);
            (first, columns.get(record, Column::LastName).map(str::to_string).or(last))
        }
    };

    let variant = columns
        .get(record, Column::Variant)
        .map(str::parse::<Variant>)
        .transpose()?;

    Ok(NewContact {
        linkedin_url,
        first_name,
        last_name,
        company: columns.get(record, Column::Company).map(str::to_string),
        job_title: columns.get(record, Column::JobTitle).map(str::to_string),
        variant,
    })
}

/// Parse a CSV document with a header row.
pub fn parse_contacts_csv<R: Read>(reader: R) -> Result<Vec<ParsedRow>, ImportError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(rdr.headers()?);
    if !columns.has(Column::LinkedinUrl) {
        return Err(ImportError::MissingUrlColumn);
    }
    if !columns.has(Column::FirstName) && !columns.has(Column::FullName) {
        return Err(ImportError::MissingNameColumn);
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        rows.push(ParsedRow {
            line,
            contact: row_to_contact(&columns, &record),
        });
    }

    debug!("Parsed {} spreadsheet rows", rows.len());
    Ok(rows)
}

/// Google Sheets share/edit links point at HTML; rewrite them to the CSV
/// export endpoint. Anything else is returned unchanged.
pub fn spreadsheet_csv_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return url.trim().to_string();
    };
    if parsed.host_str() != Some("docs.google.com") {
        return url.trim().to_string();
    }

    let segments: Vec<&str> = parsed.path_segments().map(|s| s.collect()).unwrap_or_default();
    let sheet_id = match segments.as_slice() {
        ["spreadsheets", "d", id, ..] => *id,
        _ => return url.trim().to_string(),
    };
    if segments.contains(&"export") {
        return url.trim().to_string();
    }

    let gid = parsed
        .query_pairs()
        .find(|(k, _)| k == "gid")
        .map(|(_, v)| v.into_owned())
        .or_else(|| {
            parsed
                .fragment()
                .and_then(|f| f.strip_prefix("gid="))
                .map(str::to_string)
        });

    match gid {
        Some(gid) => format!("https://docs.google.com/spreadsheets/d/{sheet_id}/export?format=csv&gid={gid}"),
        None => format!("https://docs.google.com/spreadsheets/d/{sheet_id}/export?format=csv"),
    }
}

/// Download a spreadsheet as CSV text.
pub async fn fetch_spreadsheet(http: &Client, url: &str) -> Result<String, ImportError> {
    let csv_url = spreadsheet_csv_url(url);
    info!("Downloading spreadsheet {}", csv_url);

    let response = http
        .get(&csv_url)
        .send()
        .await
        .map_err(|e| ImportError::Download(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImportError::Download(format!("{csv_url} returned {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| ImportError::Download(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_matched_loosely() {
        let csv = "LinkedIn URL,First Name,lastName,Company Name,Job Title,Variant\n\
                   https://www.linkedin.com/in/jdoe,John,Doe,Acme,Engineer,Mentorship\n";
        let rows = parse_contacts_csv(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        let contact = rows[0].contact.as_ref().unwrap();
        assert_eq!(contact.linkedin_url, "https://www.linkedin.com/in/jdoe");
        assert_eq!(contact.first_name, "John");
        assert_eq!(contact.last_name.as_deref(), Some("Doe"));
        assert_eq!(contact.company.as_deref(), Some("Acme"));
        assert_eq!(contact.job_title.as_deref(), Some("Engineer"));
        assert_eq!(contact.variant, Some(Variant::Mentorship));
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn test_full_name_is_split() {
        let csv = "profileUrl,name,title\nhttps://linkedin.com/in/al,Ada Lovelace King,Countess\n";
        let rows = parse_contacts_csv(csv.as_bytes()).unwrap();
        let contact = rows[0].contact.as_ref().unwrap();

        assert_eq!(contact.first_name, "Ada");
        assert_eq!(contact.last_name.as_deref(), Some("Lovelace King"));
        assert_eq!(contact.company, None);
    }

    #[test]
    fn test_bad_rows_are_reported_not_fatal() {
        let csv = "linkedin,first_name,variant\n\
                   ,Nobody,\n\
                   https://linkedin.com/in/x,Xavier,sales\n\
                   ,,\n\
                   https://linkedin.com/in/y,Yara,\n";
        let rows = parse_contacts_csv(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].contact.as_ref().unwrap_err().contains("LinkedIn URL"));
        assert!(rows[1].contact.as_ref().unwrap_err().contains("sales"));
        assert!(rows[2].contact.is_ok());
        assert_eq!(rows[2].line, 5);
    }

    #[test]
    fn test_missing_url_column_is_an_error() {
        let err = parse_contacts_csv("first_name,company\nJohn,Acme\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::MissingUrlColumn));
    }

    #[test]
    fn test_google_sheets_links_are_rewritten() {
        assert_eq!(
            spreadsheet_csv_url("https://docs.google.com/spreadsheets/d/abc123/edit#gid=42"),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv&gid=42"
        );
        assert_eq!(
            spreadsheet_csv_url("https://docs.google.com/spreadsheets/d/abc123/edit?usp=sharing"),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv"
        );
        assert_eq!(
            spreadsheet_csv_url("https://example.com/contacts.csv"),
            "https://example.com/contacts.csv"
        );
    }
}
