// Entry point and interactive menu.
//
// - Option [1] loads the OFGL extract, runs the pipeline and prints which
//   columns were detected.
// - Option [2] prints and exports the report tables and a JSON overview.
// After reports the user can go back to the menu or exit.
//
// Usage: commune-dashboard [config.toml]
use commune_finance::annex::summarize_services;
use commune_finance::config::DEFAULT_CONFIG_FILE;
use commune_finance::loader::{self, LoadReport};
use commune_finance::output;
use commune_finance::reports::{self, RankingMetric};
use commune_finance::util::{format_euros_compact, format_int, format_number, format_optional};
use commune_finance::{ColumnRole, DashboardConfig, Pipeline, PipelineOutcome, PipelineStatus};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Loaded once via [1], reused by every [2].
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { outcome: None }));

struct AppState {
    outcome: Option<PipelineOutcome>,
}

fn app_state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("DASHBOARD_LOG_JSON")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// `Some(true)` for Y, `Some(false)` for N, `None` on end of input.
fn prompt_back_to_menu() -> Option<bool> {
    loop {
        let resp = read_line("Back to Report Selection (Y/N): ")?.to_uppercase();
        match resp.as_str() {
            "Y" => return Some(true),
            "N" => return Some(false),
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn print_load_summary(report: &LoadReport, outcome: &PipelineOutcome) {
    println!(
        "Processing dataset... ({} rows read, {} kept by filters)",
        format_int(report.total_rows),
        format_int(outcome.filter.kept_rows)
    );
    if report.skipped_rows > 0 {
        println!(
            "Note: {} malformed rows skipped.",
            format_int(report.skipped_rows)
        );
    }
    println!();
    output::preview_table(
        "Detected columns",
        None,
        &reports::generate_role_table(&outcome.roles),
        usize::MAX,
    );
    for role in &outcome.filter.skipped {
        println!("Warning: no '{}' column, that filter was not applied.", role);
    }
    match &outcome.status {
        PipelineStatus::Complete => {
            let agg = &outcome.aggregation;
            println!(
                "{} commune-years aggregated from {} rows.",
                format_int(agg.groups),
                format_int(agg.input_rows)
            );
            if agg.rows_unreadable_year > 0 {
                println!(
                    "Note: {} rows skipped because their year could not be read.",
                    format_int(agg.rows_unreadable_year)
                );
            }
            if agg.unparseable_amounts > 0 {
                println!(
                    "Note: {} amounts could not be read and count as 0.",
                    format_int(agg.unparseable_amounts)
                );
            }
        }
        PipelineStatus::EmptyScope => {
            println!("No data for these filters.");
        }
        PipelineStatus::SchemaIncomplete { missing } => {
            let names: Vec<&str> = missing.iter().map(|r| r.as_str()).collect();
            println!(
                "Indicators unavailable: no column found for {}.",
                names.join(", ")
            );
        }
    }
    println!();
}

/// Option [1]: load, run the pipeline, store the outcome.
fn handle_load(config: &DashboardConfig) {
    let (table, report) = match loader::load_table(&config.input_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
            return;
        }
    };
    match Pipeline::new(config).run(&table) {
        Ok(outcome) => {
            print_load_summary(&report, &outcome);
            app_state().outcome = Some(outcome);
        }
        Err(e) => eprintln!("Failed to process data: {}\n", e),
    }
}

/// Option [2]: print previews and write every export.
fn handle_generate_reports(config: &DashboardConfig) {
    let outcome = app_state().outcome.clone();
    let Some(outcome) = outcome else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return;
    };
    if !outcome.is_complete() {
        println!("Error: the loaded data has no usable indicators (see option 1 output).\n");
        return;
    }
    let records = &outcome.records;
    let out = |name: &str| -> PathBuf { config.output_dir.join(name) };

    println!("Generating reports...");
    println!(
        "Amounts in units of {} €; estimates are approximations, not accounts.\n",
        format_number(config.amount_unit, 0)
    );

    let synthesis = reports::generate_synthesis(records);
    let file1 = out("report1_synthesis.csv");
    if let Err(e) = output::write_csv(&file1, &synthesis) {
        eprintln!("Write error: {}", e);
    }
    output::preview_table(
        "Report 1: Revenue / Expense Synthesis",
        Some("ExpenseEstimate and DebtEstimate are derived, not observed"),
        &synthesis,
        5,
    );
    println!("(Full table exported to {})\n", file1.display());

    let metric = RankingMetric::FinancingCapacityPerCapita;
    let latest_year = records.iter().map(|r| r.year()).max();
    let ranking = reports::generate_ranking(records, metric, latest_year, config.ranking_size);
    let file2 = out("report2_ranking.csv");
    if let Err(e) = output::write_csv(&file2, &ranking) {
        eprintln!("Write error: {}", e);
    }
    let note = latest_year.map(|y| format!("Top {} for {}", config.ranking_size, y));
    output::preview_table(
        &format!("Report 2: Ranking by {}", metric.title()),
        note.as_deref(),
        &ranking,
        config.ranking_size,
    );
    println!("(Full table exported to {})\n", file2.display());

    let groups = reports::generate_group_comparison(records);
    let file3 = out("report3_epci_comparison.csv");
    if let Err(e) = output::write_csv(&file3, &groups) {
        eprintln!("Write error: {}", e);
    }
    output::preview_table("Report 3: EPCI Comparison", None, &groups, 5);
    println!("(Full table exported to {})\n", file3.display());

    match summarize_services(
        &outcome.filtered_rows,
        &outcome.roles,
        &config.annex_budget_type,
        config.amount_unit,
    ) {
        Some(summary) => {
            let services = reports::generate_service_rows(&summary);
            let file4 = out("report4_annex_services.csv");
            if let Err(e) = output::write_csv(&file4, &services) {
                eprintln!("Write error: {}", e);
            }
            output::preview_table("Report 4: Annex Budgets by Service", None, &services, 10);
            println!("(Full table exported to {})\n", file4.display());
        }
        None => println!("Report 4 skipped: budget type or label column not found.\n"),
    }

    if outcome.roles.has(ColumnRole::Stratum) {
        let strata = reports::generate_stratum_breakdown(records, latest_year);
        let file5 = out("report5_savings_by_stratum.csv");
        if let Err(e) = output::write_csv(&file5, &strata) {
            eprintln!("Write error: {}", e);
        }
        let note = latest_year.map(|y| format!("Gross savings per inhabitant (€), {}", y));
        output::preview_table(
            "Report 5: Savings by Population Band",
            note.as_deref(),
            &strata,
            10,
        );
        println!("(Full table exported to {})\n", file5.display());
    } else {
        println!("Report 5 skipped: population band column not found.\n");
    }

    let overview = reports::generate_overview(records, config.amount_unit);
    if let Err(e) = output::write_json(&out("summary.json"), &overview) {
        eprintln!("Write error: {}", e);
    }
    println!("Summary Stats (summary.json):");
    println!(
        "{} communes, {} commune-years, total revenue {}, median estimated expense {} per inhabitant, avg expense/revenue {}%",
        overview.communes,
        overview.entity_years,
        format_euros_compact(overview.total_revenue * overview.amount_unit, 1),
        format_optional(overview.median_expense_per_capita, 0),
        format_optional(overview.avg_expense_to_revenue_pct, 1)
    );
    println!(
        "Positive financing capacity: {}% of commune-years\n",
        format_optional(overview.positive_financing_share_pct, 1)
    );
}

fn main() {
    init_tracing();
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = match DashboardConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    loop {
        println!("Commune Finance Dashboard ({})", config.input_path.display());
        println!("[1] Load the file");
        println!("[2] Generate Reports\n");
        let Some(choice) = read_line("Enter choice: ") else {
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&config),
            "2" => {
                println!();
                handle_generate_reports(&config);
                match prompt_back_to_menu() {
                    Some(true) => {}
                    _ => {
                        println!("Exiting the program.");
                        break;
                    }
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}
