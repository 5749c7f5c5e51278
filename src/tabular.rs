//! Delimited-text parsing and header normalization for roster uploads.
//!
//! Uploads arrive with whatever headers the organizing units typed into their
//! spreadsheets. Everything is funnelled onto the six canonical participant
//! fields here; the stores never see raw headers.

pub const CANONICAL_FIELDS: [&str; 6] = [
    "name",
    "stake",
    "ward_branch",
    "email",
    "phone_number",
    "tshirt_size",
];

/// Maps one lower-cased, trimmed header onto its canonical field, if any.
pub fn canonical_field(header: &str) -> Option<&'static str> {
    match header.trim().to_lowercase().as_str() {
        "name" | "full name" => Some("name"),
        "stake" => Some("stake"),
        "ward/branch" | "ward" | "branch" | "ward or branch" | "ward_branch" => Some("ward_branch"),
        "email" | "e-mail" => Some("email"),
        "phone" | "phone number" | "phone_no" | "phone_number" | "tel" | "mobile" => {
            Some("phone_number")
        }
        "tshirt" | "t-shirt" | "tshirt size" | "tshirt_size" | "shirt size" => Some("tshirt_size"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

/// One upload row reduced to the canonical fields.
///
/// Required fields are carried as trimmed strings (empty means the source had
/// nothing usable); optionals distinguish absent (`None`) from present text.
#[derive(Debug, Clone)]
pub struct RosterRow {
    pub name: String,
    pub stake: String,
    pub ward_branch: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub tshirt_size: Option<String>,
}

impl RosterRow {
    pub fn has_required(&self) -> bool {
        !self.name.is_empty() && !self.stake.is_empty() && !self.ward_branch.is_empty()
    }
}

/// Parses header + records out of delimited text.
///
/// Tolerates a UTF-8 BOM (spreadsheet exports often carry one) and blank
/// lines; the first non-blank line is the header. Short records are padded,
/// long ones truncated, so every record aligns with the header.
pub fn parse_delimited(text: &str, delim: char) -> anyhow::Result<Table> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut headers: Option<Vec<String>> = None;
    let mut records: Vec<Vec<String>> = Vec::new();

    for raw_line in text.lines() {
        if raw_line.trim().is_empty() {
            continue;
        }
        let fields = parse_record(raw_line, delim);
        match headers {
            None => headers = Some(fields),
            Some(ref h) => {
                let mut rec = fields;
                rec.resize(h.len(), String::new());
                records.push(rec);
            }
        }
    }

    let Some(headers) = headers else {
        anyhow::bail!("no header row found");
    };
    if headers.iter().all(|h| h.trim().is_empty()) {
        anyhow::bail!("header row is empty");
    }
    Ok(Table { headers, records })
}

/// Splits one delimited record, honoring quotes and doubled-quote escapes.
pub fn parse_record(line: &str, delim: char) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == delim && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Reduces a parsed table to canonical rows.
///
/// Unrecognized headers are dropped; canonical fields with no source column
/// come out absent. Never fails: a useless file just yields rows that are all
/// missing their required fields. When two headers map to the same canonical
/// field the first one wins.
pub fn normalize_rows(table: &Table) -> Vec<RosterRow> {
    let mut source_col: [Option<usize>; 6] = [None; 6];
    for (idx, header) in table.headers.iter().enumerate() {
        if let Some(field) = canonical_field(header) {
            let slot = CANONICAL_FIELDS
                .iter()
                .position(|f| *f == field)
                .unwrap_or(0);
            if source_col[slot].is_none() {
                source_col[slot] = Some(idx);
            }
        }
    }

    let cell = |record: &Vec<String>, slot: usize| -> Option<String> {
        let idx = source_col[slot]?;
        let v = record.get(idx)?.trim();
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    };

    table
        .records
        .iter()
        .map(|rec| RosterRow {
            name: cell(rec, 0).unwrap_or_default(),
            stake: cell(rec, 1).unwrap_or_default(),
            ward_branch: cell(rec, 2).unwrap_or_default(),
            email: cell(rec, 3),
            phone_number: cell(rec, 4),
            tshirt_size: cell(rec, 5),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_synonyms_resolve_to_canonical_fields() {
        for (header, want) in [
            ("Name", "name"),
            ("Full Name", "name"),
            ("STAKE", "stake"),
            ("Ward/Branch", "ward_branch"),
            ("ward", "ward_branch"),
            ("Branch", "ward_branch"),
            (" Ward or Branch ", "ward_branch"),
            ("E-mail", "email"),
            ("Email", "email"),
            ("Phone Number", "phone_number"),
            ("phone_no", "phone_number"),
            ("Tel", "phone_number"),
            ("Mobile", "phone_number"),
            ("T-Shirt", "tshirt_size"),
            ("Tshirt Size", "tshirt_size"),
            ("Shirt Size", "tshirt_size"),
        ] {
            assert_eq!(canonical_field(header), Some(want), "header {:?}", header);
        }
        assert_eq!(canonical_field("favourite color"), None);
    }

    #[test]
    fn normalize_drops_unknown_and_synthesizes_missing() {
        let table = parse_delimited(
            "Full Name,Ward,Registration Notes,Stake\nAda Lovelace,Maple 1st,vegetarian,Riverside\n",
            ',',
        )
        .expect("parse");
        let rows = normalize_rows(&table);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.name, "Ada Lovelace");
        assert_eq!(r.stake, "Riverside");
        assert_eq!(r.ward_branch, "Maple 1st");
        // No source column at all for these three.
        assert_eq!(r.email, None);
        assert_eq!(r.phone_number, None);
        assert_eq!(r.tshirt_size, None);
        assert!(r.has_required());
    }

    #[test]
    fn blank_cells_are_absent_not_empty() {
        let table =
            parse_delimited("name,stake,ward,email\nAda,Riverside,Maple 1st,  \n", ',').expect("parse");
        let rows = normalize_rows(&table);
        assert_eq!(rows[0].email, None);
    }

    #[test]
    fn bom_and_blank_lines_are_tolerated() {
        let text = "\u{feff}name,stake,branch\n\nAda,Riverside,Maple 1st\n\n";
        let table = parse_delimited(text, ',').expect("parse");
        assert_eq!(table.headers[0], "name");
        assert_eq!(table.records.len(), 1);
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_quotes() {
        let fields = parse_record("\"Lovelace, Ada\",\"say \"\"hi\"\"\",plain", ',');
        assert_eq!(fields, vec!["Lovelace, Ada", "say \"hi\"", "plain"]);
    }

    #[test]
    fn short_records_pad_to_header_width() {
        let table = parse_delimited("name,stake,ward\nAda\n", ',').expect("parse");
        assert_eq!(table.records[0].len(), 3);
        let rows = normalize_rows(&table);
        assert!(!rows[0].has_required());
        assert_eq!(rows[0].name, "Ada");
    }

    #[test]
    fn tab_delimited_parses_with_tab() {
        let table = parse_delimited("name\tstake\tward\nAda\tRiverside\tMaple 1st\n", '\t')
            .expect("parse");
        let rows = normalize_rows(&table);
        assert!(rows[0].has_required());
    }

    #[test]
    fn first_synonym_wins_on_duplicates() {
        let table = parse_delimited(
            "phone,mobile,name,stake,ward\n555-0100,555-0199,Ada,Riverside,Maple 1st\n",
            ',',
        )
        .expect("parse");
        let rows = normalize_rows(&table);
        assert_eq!(rows[0].phone_number.as_deref(), Some("555-0100"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_delimited("", ',').is_err());
        assert!(parse_delimited("\n\n", ',').is_err());
    }

    #[test]
    fn csv_quote_escapes_only_when_needed() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
