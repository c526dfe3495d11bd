use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use sourcing_contracts::events::{EventKind, EventWriter};
use sourcing_contracts::rfq::{RfqDraft, RfqSender};
use sourcing_contracts::types::{ReliabilityReport, SearchResult, SourcingParams, Supplier};
use sourcing_contracts::SourcingError;
use sourcing_engine::{GeminiConfig, GeminiModel, SourcingEngine};

#[derive(Debug, Parser)]
#[command(
    name = "sourcing-rs",
    version,
    about = "Find suppliers, check their reliability and draft RFQs"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Append diagnostics to this JSONL file
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    model: Option<String>,
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    Search(SearchArgs),
    Analyze(AnalyzeArgs),
    Rfq(RfqArgs),
}

#[derive(Debug, Parser)]
struct SearchArgs {
    #[arg(long)]
    material: Option<String>,
    #[arg(long)]
    keywords: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    requirements: Option<String>,
    /// Reference image of the product
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    website: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct RfqArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    material: String,
    #[arg(long)]
    contact: Option<String>,
    #[arg(long = "certification")]
    certifications: Vec<String>,
    #[arg(long)]
    user_name: Option<String>,
    #[arg(long)]
    company: Option<String>,
    /// Also print a mailto: link
    #[arg(long)]
    mailto: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("sourcing-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let events = cli.global.events.as_ref().map(|path| {
        EventWriter::new(path, format!("session-{}", uuid::Uuid::new_v4()))
    });
    match cli.command {
        Command::Search(args) => run_search(&cli.global, events, args),
        Command::Analyze(args) => run_analyze(&cli.global, events, args),
        Command::Rfq(args) => run_rfq(events, args),
    }
}

fn build_engine(global: &GlobalArgs, events: Option<EventWriter>) -> SourcingEngine {
    let mut config = GeminiConfig::from_env();
    if let Some(model) = global.model.as_deref() {
        config = config.with_model(model);
    }
    if let Some(api_base) = global.api_base.as_deref() {
        config = config.with_api_base(api_base);
    }
    if let Some(timeout) = global.timeout {
        config = config.with_timeout_seconds(timeout);
    }
    let engine = SourcingEngine::new(Box::new(GeminiModel::new(config)));
    match events {
        Some(events) => engine.with_events(events),
        None => engine,
    }
}

fn run_search(
    global: &GlobalArgs,
    events: Option<EventWriter>,
    args: SearchArgs,
) -> Result<i32> {
    let (image_data, image_mime_type) = match args.image.as_deref() {
        Some(path) => {
            let (data_uri, mime) = load_image_data_uri(path)?;
            (Some(data_uri), Some(mime))
        }
        None => (None, None),
    };
    let params = SourcingParams {
        material: args.material.unwrap_or_default(),
        keywords: args.keywords,
        country_filter: args.country,
        additional_requirements: args.requirements,
        image_data,
        image_mime_type,
    };
    if !params.has_query() {
        eprintln!("Please provide a product name (--material) or an image (--image) to search.");
        return Ok(2);
    }

    let engine = build_engine(global, events);
    match engine.find_suppliers(&params) {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_search(&result));
            }
            Ok(0)
        }
        Err(err) => Ok(report_failure(&err)),
    }
}

fn run_analyze(
    global: &GlobalArgs,
    events: Option<EventWriter>,
    args: AnalyzeArgs,
) -> Result<i32> {
    let supplier = Supplier {
        id: "cli-0".to_string(),
        name: args.name,
        website: args.website.unwrap_or_default(),
        country: args.country.unwrap_or_default(),
        ..Supplier::default()
    };
    let engine = build_engine(global, events);
    match engine.analyze_company_reliability(&supplier) {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&supplier, &report));
            }
            Ok(0)
        }
        Err(err) => Ok(report_failure(&err)),
    }
}

fn run_rfq(events: Option<EventWriter>, args: RfqArgs) -> Result<i32> {
    let supplier = Supplier {
        id: "cli-0".to_string(),
        name: args.name,
        contact: args.contact.unwrap_or_default(),
        material_match: args.material,
        certifications: args.certifications,
        ..Supplier::default()
    };
    let sender = RfqSender {
        user_name: args.user_name.unwrap_or_default(),
        company_name: args.company.unwrap_or_default(),
    };
    let draft = RfqDraft::for_supplier(&supplier, &sender);
    println!("{}", draft.clipboard_text());
    if args.mailto {
        println!();
        println!("{}", draft.mailto_url());
    }

    if let Some(events) = events {
        let recorded = events.record(
            EventKind::RfqDrafted,
            json_object(json!({
                "supplier_name": supplier.name,
                "has_recipient": !draft.recipient.is_empty(),
            })),
        );
        // The draft is already printed; a log failure is only worth a warning.
        if let Err(err) = recorded {
            eprintln!("sourcing-rs: event log write failed ({}): {err:#}", EventKind::RfqDrafted);
        }
    }
    Ok(0)
}

fn report_failure(err: &SourcingError) -> i32 {
    eprintln!("{} ({})", err.user_message(), err.category());
    1
}

/// Reads an image file into a `data:` URI. The mime type comes from the
/// file's magic bytes, falling back to its extension.
fn load_image_data_uri(path: &Path) -> Result<(String, String)> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let mime = image::guess_format(&bytes)
        .ok()
        .map(|format| format.to_mime_type())
        .or_else(|| mime_for_path(path));
    let Some(mime) = mime else {
        bail!("unsupported image format: {}", path.display());
    };
    let data_uri = format!("data:{mime};base64,{}", BASE64.encode(&bytes));
    Ok((data_uri, mime.to_string()))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn render_search(result: &SearchResult) -> String {
    let mut out = String::new();
    if !result.summary.is_empty() {
        out.push_str(&format!("Summary: {}\n\n", result.summary));
    }
    if result.suppliers.is_empty() {
        out.push_str("No suppliers found.\n");
    } else {
        out.push_str(&format!("Suppliers ({}):\n", result.suppliers.len()));
    }
    for (rank, supplier) in result.ranked().into_iter().enumerate() {
        out.push_str(&format!(
            "{:>2}. {} [{}] {}% reliability ({})\n",
            rank + 1,
            or_unknown(&supplier.name),
            supplier.kind.as_str(),
            trim_float(supplier.reliability_score),
            supplier.score_band().label()
        ));
        out.push_str(&format!(
            "    Country: {} | Website: {} | Contact: {}\n",
            or_unknown(&supplier.country),
            or_unknown(&supplier.website),
            or_unknown(&supplier.contact)
        ));
        if !supplier.address.is_empty() {
            out.push_str(&format!("    Address: {}\n", supplier.address));
        }
        if !supplier.material_match.is_empty() {
            out.push_str(&format!("    Match: {}\n", supplier.material_match));
        }
        if !supplier.certifications.is_empty() {
            out.push_str(&format!(
                "    Certifications: {}\n",
                supplier.certifications.join(", ")
            ));
        }
        if !supplier.why_score.is_empty() {
            out.push_str(&format!("    Why: {}\n", supplier.why_score));
        }
        out.push_str(&format!("    id: {}\n", supplier.id));
    }
    if !result.sources.is_empty() {
        out.push_str("\nSources:\n");
        for source in &result.sources {
            out.push_str(&format!(" - {} <{}>\n", or_unknown(&source.title), source.uri));
        }
    }
    out
}

fn render_report(supplier: &Supplier, report: &ReliabilityReport) -> String {
    let mut out = format!("Reliability report: {}\n", or_unknown(&supplier.name));
    let field = |out: &mut String, label: &str, value: Option<&str>| {
        out.push_str(&format!("  {label}: {}\n", value.unwrap_or("unknown")));
    };
    let list = |out: &mut String, label: &str, values: &[String]| {
        let joined = if values.is_empty() {
            "unknown".to_string()
        } else {
            values.join("; ")
        };
        out.push_str(&format!("  {label}: {joined}\n"));
    };

    out.push_str(&format!(
        "Verdict: {}",
        report
            .verdict_status()
            .map(|status| status.as_str())
            .unwrap_or("unknown")
    ));
    if let Some(conditions) = report
        .verdict
        .as_ref()
        .and_then(|verdict| verdict.conditions.as_deref())
    {
        out.push_str(&format!(" ({conditions})"));
    }
    out.push('\n');

    let score = report.score.clone().unwrap_or_default();
    let mut score_text = score
        .value
        .map(trim_float)
        .unwrap_or_else(|| "unknown".to_string());
    if let Some(category) = score.category {
        score_text.push_str(&format!(" ({category})"));
    }
    out.push_str(&format!("Score: {score_text}\n"));
    field(&mut out, "Summary", report.executive_summary.as_deref());

    let snapshot = report.snapshot.clone().unwrap_or_default();
    out.push_str("Snapshot\n");
    field(&mut out, "Legal name", snapshot.legal_name.as_deref());
    field(&mut out, "Location", snapshot.location.as_deref());
    field(&mut out, "Incorporated", snapshot.incorporation_year.as_deref());
    field(&mut out, "Ownership", snapshot.ownership.as_deref());
    field(&mut out, "Core activities", snapshot.core_activities.as_deref());

    let financials = report.financials.clone().unwrap_or_default();
    out.push_str("Financials\n");
    field(&mut out, "Creditworthiness", financials.creditworthiness.as_deref());
    field(&mut out, "Payment behavior", financials.payment_behavior.as_deref());
    list(&mut out, "Red flags", &financials.red_flags);

    let trade = report.trade_history.clone().unwrap_or_default();
    out.push_str("Trade history\n");
    field(&mut out, "Experience", trade.experience_years.as_deref());
    field(&mut out, "Markets", trade.markets.as_deref());
    field(&mut out, "Consistency", trade.consistency.as_deref());
    field(&mut out, "Inspections", trade.inspections.as_deref());

    let compliance = report.compliance.clone().unwrap_or_default();
    out.push_str("Compliance\n");
    field(&mut out, "Registration", compliance.registration_status.as_deref());
    list(&mut out, "Certifications", &compliance.certifications);
    field(&mut out, "Legal issues", compliance.legal_issues.as_deref());

    let reputation = report.reputation.clone().unwrap_or_default();
    out.push_str("Reputation\n");
    field(&mut out, "Summary", reputation.summary.as_deref());
    field(&mut out, "Feedback", reputation.feedback.as_deref());
    field(&mut out, "Online presence", reputation.online_presence.as_deref());

    out.push_str("Risk\n");
    list(&mut out, "Flags", &report.risk_flags);

    let mitigation = report.mitigation.clone().unwrap_or_default();
    out.push_str("Mitigation\n");
    field(&mut out, "Payment terms", mitigation.payment_terms.as_deref());
    field(&mut out, "Verification", mitigation.verification_actions.as_deref());
    field(&mut out, "Safeguards", mitigation.safeguards.as_deref());
    out
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "unknown"
    } else {
        value
    }
}

fn trim_float(value: f64) -> String {
    let text = format!("{value:.1}");
    text.trim_end_matches(".0").to_string()
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use sourcing_contracts::types::{GroundingSource, SupplierKind, Verdict, VerdictStatus};

    use super::*;

    fn supplier(id: &str, name: &str, score: f64) -> Supplier {
        Supplier {
            id: id.to_string(),
            name: name.to_string(),
            kind: SupplierKind::Supplier,
            country: "DE".to_string(),
            reliability_score: score,
            ..Supplier::default()
        }
    }

    #[test]
    fn parses_search_with_global_flags() {
        let cli = Cli::try_parse_from([
            "sourcing-rs",
            "search",
            "--material",
            "Polypropylene Resin",
            "--country",
            "Vietnam",
            "--events",
            "/tmp/events.jsonl",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.global.events, Some(PathBuf::from("/tmp/events.jsonl")));
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.material.as_deref(), Some("Polypropylene Resin"));
                assert_eq!(args.country.as_deref(), Some("Vietnam"));
                assert!(args.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_repeated_certifications() {
        let cli = Cli::try_parse_from([
            "sourcing-rs",
            "rfq",
            "--name",
            "Acme",
            "--material",
            "PP",
            "--certification",
            "ISO 9001",
            "--certification",
            "REACH",
        ])
        .unwrap();
        match cli.command {
            Command::Rfq(args) => assert_eq!(args.certifications, vec!["ISO 9001", "REACH"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn search_rendering_ranks_by_score() {
        let result = SearchResult {
            summary: "Resin market is tight.".to_string(),
            suppliers: vec![supplier("s-0-1", "Low", 55.0), supplier("s-1-1", "High", 92.5)],
            sources: vec![GroundingSource {
                title: "acme.de".to_string(),
                uri: "https://acme.de".to_string(),
            }],
        };
        let text = render_search(&result);
        let high = text.find("High [Supplier] 92.5% reliability (excellent)");
        let low = text.find("Low [Supplier] 55% reliability (weak)");
        assert!(high.is_some() && low.is_some());
        assert!(high < low);
        assert!(text.starts_with("Summary: Resin market is tight.\n"));
        assert!(text.contains(" - acme.de <https://acme.de>\n"));
        assert!(text.contains("Contact: unknown"));
    }

    #[test]
    fn empty_search_rendering_says_so() {
        let text = render_search(&SearchResult::default());
        assert_eq!(text, "No suppliers found.\n");
    }

    #[test]
    fn report_rendering_marks_missing_fields_unknown() {
        let report = ReliabilityReport {
            verdict: Some(Verdict {
                status: Some(VerdictStatus::Safe),
                conditions: None,
            }),
            executive_summary: Some("Solid exporter.".to_string()),
            ..ReliabilityReport::default()
        };
        let text = render_report(&supplier("s-0-1", "Acme", 80.0), &report);
        assert!(text.contains("Verdict: Safe\n"));
        assert!(text.contains("Score: unknown\n"));
        assert!(text.contains("  Summary: Solid exporter.\n"));
        assert!(text.contains("  Legal name: unknown\n"));
        assert!(text.contains("  Flags: unknown\n"));
    }

    #[test]
    fn image_mime_is_sniffed_then_guessed_from_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;

        let png = temp.path().join("sample.bin");
        fs::write(&png, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR")?;
        let (data_uri, mime) = load_image_data_uri(&png)?;
        assert_eq!(mime, "image/png");
        assert!(data_uri.starts_with("data:image/png;base64,iVBORw0KGgo"));

        let jpg = temp.path().join("photo.JPG");
        fs::write(&jpg, b"not really a jpeg")?;
        let (_, mime) = load_image_data_uri(&jpg)?;
        assert_eq!(mime, "image/jpeg");

        let txt = temp.path().join("notes.txt");
        fs::write(&txt, b"plain text")?;
        assert!(load_image_data_uri(&txt).is_err());
        Ok(())
    }

    #[test]
    fn loaded_image_round_trips_through_params() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let png = temp.path().join("sample.png");
        fs::write(&png, b"\x89PNG\r\n\x1a\nrest")?;
        let (data_uri, mime) = load_image_data_uri(&png)?;
        let params = SourcingParams {
            image_data: Some(data_uri),
            image_mime_type: Some(mime),
            ..SourcingParams::default()
        };
        let image = params.inline_image()?.unwrap_or_else(|| panic!("image expected"));
        assert_eq!(BASE64.decode(image.data)?, b"\x89PNG\r\n\x1a\nrest".to_vec());
        Ok(())
    }

    fn rfq_args(name: &str) -> RfqArgs {
        RfqArgs {
            name: name.to_string(),
            material: "PET bottles".to_string(),
            contact: Some("sales@acme.de".to_string()),
            certifications: vec!["ISO 9001".to_string()],
            user_name: None,
            company: None,
            mailto: false,
        }
    }

    #[test]
    fn rfq_survives_an_unwritable_event_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "regular file")?;
        let events = EventWriter::new(blocker.join("events.jsonl"), "session-rfq");

        assert_eq!(run_rfq(Some(events), rfq_args("Acme GmbH"))?, 0);
        Ok(())
    }

    #[test]
    fn rfq_records_the_draft() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = EventWriter::new(temp.path().join("events.jsonl"), "session-rfq");

        assert_eq!(run_rfq(Some(events.clone()), rfq_args("Acme GmbH"))?, 0);
        let content = fs::read_to_string(events.path())?;
        let line: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(line["type"], json!("rfq_drafted"));
        assert_eq!(line["supplier_name"], json!("Acme GmbH"));
        assert_eq!(line["has_recipient"], json!(true));
        Ok(())
    }

    #[test]
    fn trim_float_drops_trailing_zero() {
        assert_eq!(trim_float(82.0), "82");
        assert_eq!(trim_float(74.5), "74.5");
    }
}
