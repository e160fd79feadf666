use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dosing_core::fluids::{daily_maintenance_ml, maintenance_rate_ml_per_hour, scaled_maintenance_rate};
use dosing_core::*;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dosecalc")]
#[command(about = "Weight- and age-based dose calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override config file location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine decisions (overrides, floors, caps) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Patient inputs shared by dose commands
#[derive(clap::Args)]
struct PatientArgs {
    /// Weight in kilograms
    #[arg(long, allow_negative_numbers = true)]
    weight: Option<f64>,

    /// Age label ("naissance", "18 mois", "6 ans")
    #[arg(long)]
    age: Option<String>,

    /// Date of birth (YYYY-MM-DD), instead of --age
    #[arg(long, conflicts_with = "age")]
    born: Option<NaiveDate>,

    /// Species (human, dog, cat); defaults to the configured species
    #[arg(long)]
    species: Option<Species>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the dose of one drug
    Dose {
        /// Drug id (see `dosecalc drugs`)
        drug: Drug,

        #[command(flatten)]
        patient: PatientArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compute every dose in the species table
    Table {
        #[command(flatten)]
        patient: PatientArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Maintenance fluid rate (4-2-1 rule)
    Fluids {
        /// Weight in kilograms
        #[arg(long, allow_negative_numbers = true)]
        weight: Option<f64>,

        /// Apply the configured high-output factor
        #[arg(long)]
        high_output: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the drugs available for a species
    Drugs {
        #[arg(long)]
        species: Option<Species>,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Resolved patient, as passed to the engine
struct Patient {
    species: Species,
    weight: Option<EffectiveWeight>,
    age_months: Option<u32>,
}

#[derive(Serialize)]
struct DoseReport<'a> {
    species: Species,
    drug: Drug,
    name: &'static str,
    indication: &'a str,
    weight_kg: Option<f64>,
    /// Weight the rule was applied to, after weight overrides
    effective_weight_kg: Option<f64>,
    age_months: Option<u32>,
    dose: &'a DoseResult,
    dose_text: String,
    volume: Option<&'a DoseResult>,
    volume_text: Option<String>,
}

#[derive(Serialize)]
struct FluidsReport {
    weight_kg: Option<f64>,
    rate_ml_per_hour: Option<f64>,
    rate_text: String,
    daily_ml: Option<f64>,
    daily_text: String,
    high_output_factor: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dosing_core::logging::init(dosing_core::logging::default_level(cli.verbose));

    let config = match &cli.config {
        Some(path) if path.exists() => Config::load_from(path)?,
        Some(path) => {
            tracing::info!("No config file found at {:?}, using defaults", path);
            Config::default()
        }
        None => Config::load()?,
    };

    match cli.command {
        Commands::Dose {
            drug,
            patient,
            json,
        } => cmd_dose(drug, &patient, json, &config),
        Commands::Table { patient, json } => cmd_table(&patient, json, &config),
        Commands::Fluids {
            weight,
            high_output,
            json,
        } => cmd_fluids(weight, high_output, json, &config),
        Commands::Drugs { species } => cmd_drugs(species.unwrap_or(config.patient.species)),
        Commands::InitConfig { force } => cmd_init_config(cli.config, force),
    }
}

/// Load the species table, failing loudly on configuration defects
fn load_table(species: Species) -> Result<&'static DosingRuleTable> {
    let table = rule_table(species);
    let errors = table.validate();
    if !errors.is_empty() {
        eprintln!("Rule table validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation(format!("Invalid {} table", species)));
    }
    Ok(table)
}

fn resolve_patient(args: &PatientArgs, config: &Config) -> Patient {
    let bounds = config.weight_bounds();
    let weight = resolve_weight(args.weight, bounds.as_ref());

    let age_months = match args.born {
        Some(born) => months_between(born, chrono::Local::now().date_naive()),
        None => months_from_label(args.age.as_deref()),
    };
    if args.age.is_some() && age_months.is_none() {
        tracing::warn!("Unrecognised age label {:?}", args.age);
    }

    Patient {
        species: args.species.unwrap_or(config.patient.species),
        weight,
        age_months,
    }
}

fn report<'a>(
    patient: &Patient,
    prescribed: &'a PrescribedDose,
    opts: &FormatOptions,
) -> DoseReport<'a> {
    DoseReport {
        species: patient.species,
        drug: prescribed.entry.drug,
        name: prescribed.entry.drug.name(),
        indication: &prescribed.entry.indication,
        weight_kg: patient.weight.map(|w| w.kg()),
        effective_weight_kg: prescribed.effective_weight.map(|w| w.display_kg()),
        age_months: patient.age_months,
        dose: &prescribed.dose,
        dose_text: format_result(&prescribed.dose, opts),
        volume: prescribed.volume.as_ref(),
        volume_text: prescribed.volume.as_ref().map(|v| format_result(v, opts)),
    }
}

/// "4 kg (override for 3.2 kg)" when the rule substituted the patient's weight
fn override_note(patient: &Patient, prescribed: &PrescribedDose, opts: &FormatOptions) -> Option<String> {
    let (Some(actual), Some(used)) = (patient.weight, prescribed.effective_weight) else {
        return None;
    };
    if actual == used {
        return None;
    }
    Some(format!(
        "{} (override for {})",
        format_value(Some(used.display_kg()), Some("kg"), opts),
        format_value(Some(actual.display_kg()), Some("kg"), opts)
    ))
}

fn cmd_dose(drug: Drug, args: &PatientArgs, json: bool, config: &Config) -> Result<()> {
    let patient = resolve_patient(args, config);
    let table = load_table(patient.species)?;
    let entry = table.entry(drug).ok_or_else(|| {
        Error::InvalidInput(format!("{} has no {} entry", drug, patient.species))
    })?;

    let opts = config.format_options();
    let prescribed = prescribe(entry, patient.weight, patient.age_months);
    let report = report(&patient, &prescribed, &opts);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    display_patient(&patient, &opts);
    println!();
    println!("  {} ({})", report.name, report.indication);
    if let Some(note) = override_note(&patient, &prescribed, &opts) {
        println!("  → Weight: {}", note);
    }
    println!("  → Dose:   {}", report.dose_text);
    if let (Some(volume), Some(concentration)) =
        (&report.volume_text, entry.concentration_per_ml)
    {
        let strength = format_value(Some(concentration), None, &opts);
        println!(
            "  → Volume: {} (at {} {}/mL)",
            volume,
            strength,
            entry.dosing.unit()
        );
    }
    println!();

    Ok(())
}

fn cmd_table(args: &PatientArgs, json: bool, config: &Config) -> Result<()> {
    let patient = resolve_patient(args, config);
    let table = load_table(patient.species)?;
    let opts = config.format_options();

    let prescribed: Vec<_> = table
        .entries()
        .map(|entry| prescribe(entry, patient.weight, patient.age_months))
        .collect();

    if json {
        let reports: Vec<_> = prescribed
            .iter()
            .map(|p| report(&patient, p, &opts))
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    display_patient(&patient, &opts);
    println!();
    for p in &prescribed {
        let r = report(&patient, p, &opts);
        let indication = match override_note(&patient, p, &opts) {
            Some(note) => format!("{} [weight {}]", r.indication, note),
            None => r.indication.to_string(),
        };
        println!(
            "  {:<20} {:>14} {:>14}  {}",
            r.name,
            r.dose_text,
            r.volume_text.unwrap_or_default(),
            indication
        );
    }
    println!();

    Ok(())
}

fn cmd_fluids(weight: Option<f64>, high_output: bool, json: bool, config: &Config) -> Result<()> {
    let weight = resolve_weight(weight, config.weight_bounds().as_ref());
    let opts = config.format_options();

    let factor = high_output.then_some(config.fluids.high_output_factor);
    let rate = match factor {
        Some(factor) => scaled_maintenance_rate(weight, factor),
        None => maintenance_rate_ml_per_hour(weight),
    };
    let daily = match factor {
        Some(_) => rate.map(|r| r * 24.0),
        None => daily_maintenance_ml(weight),
    };

    let fluids = FluidsReport {
        weight_kg: weight.map(|w| w.kg()),
        rate_ml_per_hour: rate,
        rate_text: format_value(rate, Some("mL/h"), &opts),
        daily_ml: daily,
        daily_text: format_value(daily, Some("mL/24h"), &opts),
        high_output_factor: factor,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&fluids)?);
        return Ok(());
    }

    println!(
        "  Weight:      {}",
        format_value(weight.map(|w| w.display_kg()), Some("kg"), &opts)
    );
    match factor {
        Some(factor) => println!("  Maintenance: {} (×{})", fluids.rate_text, factor),
        None => println!("  Maintenance: {}", fluids.rate_text),
    }
    println!("  Per day:     {}", fluids.daily_text);

    Ok(())
}

fn cmd_drugs(species: Species) -> Result<()> {
    let table = load_table(species)?;
    for entry in table.entries() {
        println!(
            "  {:<18} {:<20} {}",
            entry.drug.id(),
            entry.drug.name(),
            entry.indication
        );
    }
    Ok(())
}

fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path
        .or_else(Config::default_config_path)
        .ok_or_else(|| Error::Config("No config directory available".into()))?;

    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save_to(&path)?;
    println!("✓ Wrote default config to {}", path.display());
    Ok(())
}

fn display_patient(patient: &Patient, opts: &FormatOptions) {
    let weight = format_value(patient.weight.map(|w| w.display_kg()), Some("kg"), opts);
    let age = match patient.age_months {
        Some(months) if months >= 24 => format!("{} years", months / 12),
        Some(months) => format!("{} months", months),
        None => opts.placeholder.clone(),
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {} PATIENT", patient.species.id().to_uppercase());
    println!("╰─────────────────────────────────────────╯");
    println!("  Weight: {}   Age: {}", weight, age);
}
