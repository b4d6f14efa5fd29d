//! # Waybill CLI
//!
//! Fill PDF waybill templates with driver and trip data.
//!
//! ## Usage
//!
//! ```bash
//! # Register a driver and list the roster
//! waybill drivers add --last-name Ivanov --first-name Petr \
//!     --license-serial 7700 --license-number 123456
//! waybill drivers list
//!
//! # Import a template and look at its form fields
//! waybill templates add ~/Downloads/waybill.pdf
//! waybill fields waybill.pdf
//!
//! # Place values by coordinates (PDF points, origin bottom-left)
//! waybill mapping place waybill.pdf --key fio --x 120 --y 705
//! waybill mapping show waybill.pdf
//!
//! # Generate a filled waybill
//! waybill generate --driver 1700000000000 --template waybill.pdf \
//!     --date-from 2026-10-18 --vehicle-number A123BC77 --json
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use pdf_core::PdfDocument;
use std::path::PathBuf;

use waybill::{
    delete_template, field_label, format_date_range, import_template, inspect_fields,
    list_templates, suggest_waybill_number, AppConfig, Driver, DriverId, DriverRoster,
    MappingSession, Odometer, WaybillInput, WaybillService, VALUE_KEYS,
};

/// Waybill - fill PDF waybill templates
#[derive(Parser, Debug)]
#[command(name = "waybill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory holding drivers.json and templates/
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Directory generated waybills are written to
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// TrueType font tried before the system fonts
    #[arg(long, global = true, value_name = "FILE")]
    font: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the driver roster
    Drivers {
        #[command(subcommand)]
        command: DriverCommands,
    },

    /// Manage templates
    Templates {
        #[command(subcommand)]
        command: Option<TemplateCommands>,
    },

    /// List the form field names of a template
    Fields {
        /// Template file name
        template: String,
    },

    /// Edit the coordinate mapping of a template
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },

    /// Fill a template for a driver
    Generate(GenerateArgs),
}

#[derive(Subcommand, Debug)]
enum DriverCommands {
    /// List drivers
    List {
        /// Case-insensitive part of the full name
        #[arg(long)]
        filter: Option<String>,
    },

    /// Add a driver
    Add {
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        middle_name: Option<String>,
        #[arg(long)]
        license_serial: String,
        #[arg(long)]
        license_number: String,
        /// License issue date (YYYY-MM-DD)
        #[arg(long)]
        license_date: Option<String>,
        #[arg(long)]
        snils: Option<String>,
    },

    /// Remove a driver by id
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// List templates (default)
    List,
    /// Copy a PDF into the templates directory
    Add { file: PathBuf },
    /// Delete a template and its mapping
    Remove { template: String },
}

#[derive(Subcommand, Debug)]
enum MappingCommands {
    /// Print the placements of a template
    Show { template: String },

    /// Place a value at a point; the point marks the top of the text
    Place {
        template: String,
        /// Value key (e.g. fio, date, vehicleNumber)
        #[arg(long)]
        key: String,
        /// X in PDF points from the left
        #[arg(long)]
        x: f64,
        /// Y in PDF points from the bottom
        #[arg(long)]
        y: f64,
        /// Zero-based page index
        #[arg(long, default_value = "0")]
        page: usize,
        #[arg(long, default_value = "10")]
        font_size: u32,
    },

    /// Remove a placement by id
    Remove { template: String, id: String },

    /// List the value keys that can be placed
    Keys,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Driver id
    #[arg(long)]
    driver: String,

    /// Template file name
    #[arg(long)]
    template: String,

    /// First trip day (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date_from: Option<String>,

    /// Last trip day (YYYY-MM-DD)
    #[arg(long)]
    date_to: Option<String>,

    /// Waybill number, suggested when omitted
    #[arg(long)]
    number: Option<String>,

    #[arg(long)]
    vehicle_model: Option<String>,
    #[arg(long)]
    vehicle_number: Option<String>,
    #[arg(long)]
    departure_point: Option<String>,
    #[arg(long)]
    destination: Option<String>,
    #[arg(long)]
    departure_time: Option<String>,
    #[arg(long)]
    return_time: Option<String>,
    #[arg(long)]
    odometer_start: Option<String>,
    #[arg(long)]
    odometer_end: Option<String>,
    #[arg(long)]
    route: Option<String>,

    /// Do not store vehicle and route as the driver's defaults
    #[arg(long)]
    no_remember: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(dir) = cli.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(font) = cli.font {
        config = config.with_font(font);
    }
    config.ensure_dirs()?;

    match cli.command {
        Commands::Drivers { command } => run_drivers(&config, command),
        Commands::Templates { command } => {
            run_templates(&config, command.unwrap_or(TemplateCommands::List))
        }
        Commands::Fields { template } => {
            let path = config.mapping_store().template_path(&template)?;
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let names = inspect_fields(&bytes)?;
            if names.is_empty() {
                println!("{} has no form fields", template);
            }
            for name in names {
                let rule = waybill::match_field(&name)
                    .map(|rule| rule.key)
                    .unwrap_or("-");
                println!("  {:<40} {}", name, rule);
            }
            Ok(())
        }
        Commands::Mapping { command } => run_mapping(&config, command),
        Commands::Generate(args) => run_generate(config, args),
    }
}

fn run_drivers(config: &AppConfig, command: DriverCommands) -> Result<()> {
    let mut roster = DriverRoster::load(config.drivers_file())?;

    match command {
        DriverCommands::List { filter } => {
            let drivers = roster.search(filter.as_deref().unwrap_or(""));
            if drivers.is_empty() {
                println!("No drivers");
            }
            for driver in drivers {
                println!(
                    "  {:<16} {:<40} {}",
                    driver.id.to_string(),
                    driver.full_name(),
                    driver.license_summary().unwrap_or_default()
                );
            }
        }
        DriverCommands::Add {
            last_name,
            first_name,
            middle_name,
            license_serial,
            license_number,
            license_date,
            snils,
        } => {
            let driver = Driver {
                middle_name,
                license_serial: Some(license_serial),
                license_number: Some(license_number),
                license_date,
                snils,
                ..Driver::new(last_name, first_name)
            };
            let id = roster.upsert(driver)?;
            roster.save()?;
            println!("Added driver {}", id);
        }
        DriverCommands::Remove { id } => {
            let removed = roster.remove(&DriverId::parse(&id))?;
            roster.save()?;
            println!("Removed {}", removed.full_name());
        }
    }
    Ok(())
}

fn run_templates(config: &AppConfig, command: TemplateCommands) -> Result<()> {
    let store = config.mapping_store();

    match command {
        TemplateCommands::List => {
            let names = list_templates(store.templates_dir())?;
            if names.is_empty() {
                println!("No templates in {}", store.templates_dir().display());
            }
            for name in names {
                let placements = store.load(&name).map(|mapping| mapping.len()).unwrap_or(0);
                if placements > 0 {
                    println!("  {} ({} placement(s))", name, placements);
                } else {
                    println!("  {}", name);
                }
            }
        }
        TemplateCommands::Add { file } => {
            let name = import_template(&file, store.templates_dir())?;
            println!("Imported {}", name);
        }
        TemplateCommands::Remove { template } => {
            delete_template(&store, &template)?;
            println!("Deleted {}", template);
        }
    }
    Ok(())
}

fn run_mapping(config: &AppConfig, command: MappingCommands) -> Result<()> {
    let store = config.mapping_store();

    match command {
        MappingCommands::Show { template } => {
            let doc = PdfDocument::open(store.template_path(&template)?)?;
            let session = MappingSession::open(&store, &template, doc.page_count())?;
            for page in doc.pages()? {
                println!(
                    "Page {} ({} x {} pt, rotated {})",
                    page.index,
                    page.width,
                    page.height,
                    page.rotation.degrees()
                );
                for field in session.fields_on_page(page.index) {
                    println!(
                        "  {:<16} {:<20} x={:<8} y={:<8} size={}",
                        field.id,
                        field_label(&field.data_key),
                        field.pdf_x.map(|x| x.to_string()).unwrap_or_default(),
                        field.pdf_y.map(|y| y.to_string()).unwrap_or_default(),
                        field.font_size
                    );
                }
            }
        }
        MappingCommands::Place {
            template,
            key,
            x,
            y,
            page,
            font_size,
        } => {
            let doc = PdfDocument::open(store.template_path(&template)?)?;
            if page >= doc.page_count() {
                bail!("{} has {} page(s)", template, doc.page_count());
            }
            let mut session = MappingSession::open(&store, &template, doc.page_count())?;
            session.go_to_page(page);
            let id = session.place(&key, x, y, font_size)?;
            session.save(&store)?;
            println!("Placed {} as {}", field_label(&key), id);
        }
        MappingCommands::Remove { template, id } => {
            let doc = PdfDocument::open(store.template_path(&template)?)?;
            let mut session = MappingSession::open(&store, &template, doc.page_count())?;
            if !session.remove(&id) {
                bail!("No placement {} in {}", id, template);
            }
            session.save(&store)?;
            println!("Removed {}", id);
        }
        MappingCommands::Keys => {
            for key in VALUE_KEYS {
                println!("  {:<16} {}", key, field_label(key));
            }
        }
    }
    Ok(())
}

fn run_generate(config: AppConfig, args: GenerateArgs) -> Result<()> {
    let mut roster = DriverRoster::load(config.drivers_file())?;
    let id = DriverId::parse(&args.driver);
    let driver = roster
        .find(&id)
        .cloned()
        .with_context(|| format!("Driver not found: {}", args.driver))?;

    let today = Local::now().date_naive();
    let date_from = args
        .date_from
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

    let mut input = WaybillInput::from_defaults(driver.waybill_template.as_ref());
    input.date = format_date_range(&date_from, args.date_to.as_deref().unwrap_or(""));
    input.number = args.number.unwrap_or_else(|| {
        suggest_waybill_number(&driver, today, Utc::now().timestamp_millis())
    });
    for (target, value) in [
        (&mut input.vehicle_model, args.vehicle_model),
        (&mut input.vehicle_number, args.vehicle_number),
        (&mut input.departure_point, args.departure_point),
        (&mut input.destination, args.destination),
        (&mut input.departure_time, args.departure_time),
        (&mut input.return_time, args.return_time),
        (&mut input.route, args.route),
    ] {
        if let Some(value) = value {
            *target = value;
        }
    }
    if let Some(value) = args.odometer_start {
        input.odometer_start = Odometer::Text(value);
    }
    if let Some(value) = args.odometer_end {
        input.odometer_end = Odometer::Text(value);
    }

    let service = WaybillService::new(config);
    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(service.generate(&args.template, &driver, &input));

    if outcome.is_success() && !args.no_remember {
        if let Some(stored) = roster.find_mut(&id) {
            stored.remember_trip(&input);
            roster.save()?;
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let waybill::GenerateOutcome::Success {
        file_path, report, ..
    } = &outcome
    {
        println!(
            "Saved {} ({} field(s) filled)",
            file_path.display(),
            report.fields_filled
        );
    }

    if let waybill::GenerateOutcome::Failure { error } = outcome {
        bail!(error);
    }
    Ok(())
}
