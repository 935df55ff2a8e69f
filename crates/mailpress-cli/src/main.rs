//! mailpress - mail folder to PDF converter
//!
//! Reads one mail folder (an mbox file or a directory of `.eml` files),
//! indexes it, and writes one paginated PDF per message. Filenames and
//! header/footer band text come from format templates; see the library
//! crates for the template language.

use anyhow::{bail, Context, Result};
use chrono::Locale;
use chrono_tz::Tz;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use mailpress_core::{
    read_folder, AddrField, FormatProgram, IndexKey, IndexRegistry, Mailbox, Message,
    RenderContext,
};
use mailpress_pdf::{
    BandTemplates, DocumentConfig, DocumentWriter, FontFace, FontSpec, Margins, PageGeometry,
    Paper, PdfCanvas, RoleFonts,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Fields printed when no `--field` is given
const DEFAULT_FIELDS: [&str; 5] = ["From", "To", "Cc", "Subject", "Date"];

/// Filename template when none is configured: date, day serial, sender
const DEFAULT_NAME_TEMPLATE: &str = "%Y-%m-%d_@*n_@F";

/// Exit code for fatal errors, above the recoverable-failure clamp
const FATAL_EXIT: i32 = 102;

/// Where the attachment listing is placed in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum AttachmentSlot {
    /// Between the mail headers and the body
    #[default]
    Pre,
    /// After the body
    Post,
    /// No attachment listing
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PaperChoice {
    /// 210 x 297 mm
    A4,
    /// 8.5 x 11 in
    Letter,
}

impl From<PaperChoice> for Paper {
    fn from(choice: PaperChoice) -> Self {
        match choice {
            PaperChoice::A4 => Self::A4,
            PaperChoice::Letter => Self::Letter,
        }
    }
}

/// Configuration file structure, same keys as the flags; flags win
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    locale: Option<String>,
    timezone: Option<String>,
    paper: Option<String>,
    name_template: Option<String>,
    header_left: Option<String>,
    header_center: Option<String>,
    header_right: Option<String>,
    footer_left: Option<String>,
    footer_center: Option<String>,
    footer_right: Option<String>,
    fields: Option<Vec<String>>,
    attachments: Option<String>,
    margin: Option<f64>,
    body_size: Option<f64>,
}

impl Config {
    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "mailpress",
    about = "Convert a mail folder into paginated PDF documents",
    long_about = "Convert a mail folder into one paginated PDF per message.\n\
                  \n\
                  The folder is an mbox file or a directory of .eml files. Filenames\n\
                  and header/footer text come from format templates mixing strftime\n\
                  %-escapes with @-escapes for message data, folder serials and page\n\
                  numbers (page codes are only valid in header/footer templates).",
    version
)]
struct Args {
    /// Mail folder: an mbox file or a directory of .eml files
    #[arg(value_name = "FOLDER")]
    folder: PathBuf,

    /// Output directory for generated documents
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Filename template; .pdf is appended when missing
    #[arg(short = 'n', long, value_name = "TEMPLATE")]
    name_template: Option<String>,

    /// Header band templates (left, center, right box)
    #[arg(long, value_name = "TEMPLATE")]
    header_left: Option<String>,
    #[arg(long, value_name = "TEMPLATE")]
    header_center: Option<String>,
    #[arg(long, value_name = "TEMPLATE")]
    header_right: Option<String>,

    /// Footer band templates (left, center, right box)
    #[arg(long, value_name = "TEMPLATE")]
    footer_left: Option<String>,
    #[arg(long, value_name = "TEMPLATE")]
    footer_center: Option<String>,
    #[arg(long, value_name = "TEMPLATE")]
    footer_right: Option<String>,

    /// Mail-header field to print, in order; repeatable
    /// (default: From, To, Cc, Subject, Date)
    #[arg(long = "field", value_name = "NAME")]
    fields: Vec<String>,

    /// Where the attachment listing goes
    #[arg(long, value_enum)]
    attachments: Option<AttachmentSlot>,

    /// Additionally write each raw message next to its PDF as .txt
    #[arg(long)]
    dump_text: bool,

    /// Overwrite existing output files
    #[arg(long)]
    force: bool,

    /// Locale for month and weekday names (e.g. de_DE)
    #[arg(long, value_name = "NAME")]
    locale: Option<String>,

    /// Timezone for dates and day serials (e.g. Europe/Berlin)
    #[arg(long, value_name = "NAME")]
    timezone: Option<String>,

    /// Paper size
    #[arg(long, value_enum)]
    paper: Option<PaperChoice>,

    /// Uniform page margin in points
    #[arg(long, value_name = "PT")]
    margin: Option<f64>,

    /// Body font size in points
    #[arg(long, value_name = "PT")]
    body_size: Option<f64>,

    /// TOML configuration file with the same keys as the flags
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Suppress per-message status output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(failures) => {
            // exit status carries the recoverable-failure count, clamped
            let code = i32::try_from(failures.min(101)).unwrap_or(101);
            std::process::exit(code);
        }
        Err(err) => {
            eprintln!("{} {err:#}", "Error:".red().bold());
            std::process::exit(FATAL_EXIT);
        }
    }
}

/// Run the conversion; returns the number of recoverable failures
fn run(args: Args) -> Result<usize> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let locale_name = args
        .locale
        .or(config.locale)
        .unwrap_or_else(|| "POSIX".to_string());
    let locale = parse_locale(&locale_name);

    let tz_name = args
        .timezone
        .or(config.timezone)
        .unwrap_or_else(|| "UTC".to_string());
    let tz: Tz = tz_name
        .parse()
        .map_err(|e| anyhow::anyhow!("unknown timezone '{tz_name}': {e}"))?;

    let paper = resolve_paper(args.paper, config.paper.as_deref());
    let margin = args.margin.or(config.margin).unwrap_or(54.0);
    let body_size = args.body_size.or(config.body_size).unwrap_or(10.0);

    let name_template = args
        .name_template
        .or(config.name_template)
        .unwrap_or_else(|| DEFAULT_NAME_TEMPLATE.to_string());
    let name_program = FormatProgram::compile(&name_template)
        .with_context(|| format!("bad filename template '{name_template}'"))?;
    if name_program.flags().page_refs > 0 {
        bail!("page codes cannot appear in the filename template '{name_template}'");
    }

    let header = BandTemplates {
        left: compile_band("header-left", args.header_left.or(config.header_left))?,
        center: compile_band("header-center", args.header_center.or(config.header_center))?,
        right: compile_band("header-right", args.header_right.or(config.header_right))?,
    };
    let footer = BandTemplates {
        left: compile_band("footer-left", args.footer_left.or(config.footer_left))?,
        center: compile_band("footer-center", args.footer_center.or(config.footer_center))?,
        right: compile_band("footer-right", args.footer_right.or(config.footer_right))?,
    };

    let fields: Vec<String> = if args.fields.is_empty() {
        config
            .fields
            .unwrap_or_else(|| DEFAULT_FIELDS.iter().map(ToString::to_string).collect())
    } else {
        args.fields
    };

    let slot = args
        .attachments
        .or_else(|| parse_slot(config.attachments.as_deref()))
        .unwrap_or_default();

    let fonts = RoleFonts {
        body: FontSpec::new(FontFace::Courier, body_size),
        ..RoleFonts::default()
    };
    let margins = Margins {
        top: margin,
        bottom: margin,
        left: margin,
        right: margin,
    };
    let geometry = PageGeometry::new(paper, margins, fonts, header.any(), footer.any())?;

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            args.output_dir.display()
        )
    })?;

    let messages = match read_folder(&args.folder) {
        Ok(messages) => messages,
        Err(err) => {
            eprintln!(
                "{} cannot read folder {}: {err}",
                "Warning:".yellow().bold(),
                args.folder.display()
            );
            return Ok(1);
        }
    };

    let mut registry = IndexRegistry::new();
    let key = IndexKey {
        folder: args.folder.clone(),
        locale: locale_name,
        timezone: tz_name,
    };
    let index = registry.get_or_build(key, locale, tz, move || messages);

    if !index.is_unique(&name_program)? {
        eprintln!(
            "{} filename template '{name_template}' is not unique for this folder; \
             duplicates will be skipped",
            "Warning:".yellow().bold()
        );
    }

    let mut failures = 0usize;
    let mut converted = 0usize;
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut used_names: HashSet<String> = HashSet::new();

    for message in index.messages() {
        if let Some(id) = &message.message_id {
            if !seen_ids.insert(id.as_str()) {
                eprintln!(
                    "{} duplicate Message-ID <{id}>, skipping",
                    "Warning:".yellow().bold()
                );
                failures += 1;
                continue;
            }
        }

        let mut name = match index.format_in_cache(&name_program, message) {
            Some(name) => name,
            None => name_program.render(&RenderContext::new(locale, tz, message).with_index(&index))?,
        };
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            name.push_str(".pdf");
        }
        if !used_names.insert(name.clone()) {
            eprintln!(
                "{} duplicate generated name {name}, skipping",
                "Warning:".yellow().bold()
            );
            failures += 1;
            continue;
        }

        let out_path = args.output_dir.join(&name);
        if out_path.exists() && !args.force {
            eprintln!(
                "{} {} exists, skipping (use --force to overwrite)",
                "Warning:".yellow().bold(),
                out_path.display()
            );
            failures += 1;
            continue;
        }

        let canvas = PdfCanvas::new(geometry.paper_w, geometry.paper_h);
        let doc_config = DocumentConfig {
            geometry: geometry.clone(),
            header: header.clone(),
            footer: footer.clone(),
            repeat_prefix: true,
        };
        let mut doc =
            DocumentWriter::new(canvas, doc_config, locale, tz, message, Some(index.as_ref()))?;

        for field in &fields {
            print_field(&mut doc, message, field)?;
        }

        let attachment_names: Vec<String> = message
            .attachments()
            .iter()
            .map(|a| a.name.unwrap_or(a.mime).to_string())
            .collect();
        if slot == AttachmentSlot::Pre && !attachment_names.is_empty() {
            // a message with attachments but none of the selected fields has
            // no pre-body slot; skip the message, not the run
            if let Err(err) = doc.print_attachments(&attachment_names) {
                eprintln!("{} {name}: {err}, skipping", "Warning:".yellow().bold());
                failures += 1;
                continue;
            }
        }

        match message.primary_text() {
            Some(lines) => doc.print_lines(lines)?,
            None => {
                warn!(name = %name, "message has no text body");
                eprintln!(
                    "{} {name}: no text body, document will be incomplete",
                    "Warning:".yellow().bold()
                );
                failures += 1;
            }
        }

        if slot == AttachmentSlot::Post && !attachment_names.is_empty() {
            doc.print_attachments(&attachment_names)?;
        }

        let pages = doc
            .close(&out_path)
            .with_context(|| format!("failed to write {}", out_path.display()))?;

        if args.dump_text {
            let txt_path = out_path.with_extension("txt");
            fs::write(&txt_path, &message.raw)
                .with_context(|| format!("failed to write {}", txt_path.display()))?;
        }

        converted += 1;
        if !args.quiet {
            eprintln!("{} {name} ({pages} pages)", "✓".green().bold());
        }
    }

    if !args.quiet {
        eprintln!(
            "{} {} converted, {} skipped or incomplete",
            "Done:".green().bold(),
            converted.to_string().cyan(),
            failures.to_string().cyan()
        );
    }
    Ok(failures)
}

/// Print one mail-header field: address fields render their mailboxes,
/// everything else prints the stored header values verbatim
fn print_field<C: mailpress_pdf::Canvas>(
    doc: &mut DocumentWriter<'_, C>,
    message: &Message,
    field: &str,
) -> Result<()> {
    let values: Vec<String> = match addr_field(field) {
        Some(addr) => message
            .addresses(addr)
            .iter()
            .map(format_mailbox)
            .collect(),
        None => message.header_values(field).map(ToString::to_string).collect(),
    };
    doc.print_header(field, &values)?;
    Ok(())
}

fn addr_field(name: &str) -> Option<AddrField> {
    match name.to_ascii_lowercase().as_str() {
        "from" => Some(AddrField::From),
        "to" => Some(AddrField::To),
        "cc" => Some(AddrField::Cc),
        "bcc" => Some(AddrField::Bcc),
        "sender" => Some(AddrField::Sender),
        _ => None,
    }
}

fn format_mailbox(mailbox: &Mailbox) -> String {
    match &mailbox.name {
        Some(name) => format!("{name} <{}>", mailbox.address),
        None => mailbox.address.clone(),
    }
}

/// Parse a locale name like `de_DE.UTF-8`; unknown names fall back to
/// POSIX with a warning
fn parse_locale(name: &str) -> Locale {
    let base = name.split('.').next().unwrap_or(name);
    Locale::try_from(base).unwrap_or_else(|_| {
        warn!(locale = name, "unknown locale, falling back to POSIX");
        Locale::POSIX
    })
}

fn resolve_paper(cli: Option<PaperChoice>, config: Option<&str>) -> Paper {
    if let Some(choice) = cli {
        return choice.into();
    }
    match config.map(str::to_ascii_lowercase).as_deref() {
        Some("letter") => Paper::Letter,
        _ => Paper::A4,
    }
}

fn parse_slot(config: Option<&str>) -> Option<AttachmentSlot> {
    match config.map(str::to_ascii_lowercase).as_deref() {
        Some("pre") => Some(AttachmentSlot::Pre),
        Some("post") => Some(AttachmentSlot::Post),
        Some("none") => Some(AttachmentSlot::None),
        Some(other) => {
            warn!(value = other, "unknown attachments setting in config");
            None
        }
        None => None,
    }
}

fn compile_band(which: &str, template: Option<String>) -> Result<Option<FormatProgram>> {
    template
        .map(|t| {
            FormatProgram::compile(&t).with_context(|| format!("bad {which} template '{t}'"))
        })
        .transpose()
}
