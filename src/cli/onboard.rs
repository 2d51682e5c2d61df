use crate::config::{
    Config, TOP_ISLANDS_RANGE, TOP_PROVINCES_RANGE, default_report_dir, expand_home,
};
use crate::dataset::Dataset;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to covidash onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    let config_path = Config::config_path()?;
    if config_path.exists() {
        let overwrite = Confirm::with_theme(&theme)
            .with_prompt("  A config already exists. Run onboarding again and overwrite it?")
            .default(false)
            .interact()
            .context("Failed to read overwrite choice")?;

        if !overwrite {
            println!("  Keeping the existing configuration.");
            return Config::load();
        }
    }

    println!("\n[1/4] Dataset file");
    println!("  Point covidash at the COVID-19 Indonesia time-series CSV.");

    let dataset_input: String = Input::with_theme(&theme)
        .with_prompt("  Path to the dataset CSV")
        .default(defaults.dataset_path.display().to_string())
        .interact_text()
        .context("Failed to read dataset path")?;

    let dataset_path = expand_home(&dataset_input);
    let dataset = Dataset::load(&dataset_path)
        .with_context(|| format!("Failed to load dataset: {}", dataset_path.display()))?;

    let date_span = dataset
        .date_range()
        .map(|(first, last)| format!("{first} .. {last}"))
        .unwrap_or_else(|| "empty".to_string());
    println!(
        "  ✓ Loaded {} rows, {} provinces, {date_span}",
        dataset.len(),
        dataset.provinces().len()
    );

    println!("\n[2/4] API port");
    let port_input: String = Input::with_theme(&theme)
        .with_prompt("  Port for the local dashboard server")
        .default(defaults.api_port.to_string())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            input
                .trim()
                .parse::<u16>()
                .map(|_| ())
                .map_err(|_| "Use a port number between 1 and 65535")
        })
        .interact_text()
        .context("Failed to read API port")?;
    let api_port = port_input
        .trim()
        .parse::<u16>()
        .context("Invalid API port")?;
    println!("  ✓ Dashboard will serve on http://127.0.0.1:{api_port}");

    println!("\n[3/4] Report output directory");
    let default_report_dir = default_report_dir().display().to_string();
    let report_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder where summary reports will be saved")
        .default(default_report_dir)
        .interact_text()
        .context("Failed to read report directory")?;

    let report_dir = expand_home(&report_dir_input);
    println!("  ✓ {}", report_dir.display());

    println!("\n[4/4] Ranking sizes");
    let top_provinces = prompt_ranking_size(
        &theme,
        "  Provinces shown in the top ranking",
        defaults.top_provinces,
        TOP_PROVINCES_RANGE,
    )?;
    let top_islands = prompt_ranking_size(
        &theme,
        "  Islands shown in the top ranking",
        defaults.top_islands,
        TOP_ISLANDS_RANGE,
    )?;
    println!("  ✓ Top {top_provinces} provinces, top {top_islands} islands");

    let config = Config {
        dataset_path,
        report_dir,
        api_port,
        top_provinces,
        top_islands,
    };

    config.ensure_bootstrap_files()?;
    config.save()?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run covidash dashboard to open the explorer.");
    println!("  Run covidash status to check current state.");
    println!("──────────────────────────────────────────");

    Ok(config)
}

fn prompt_ranking_size(
    theme: &ColorfulTheme,
    prompt: &str,
    default: usize,
    range: (usize, usize),
) -> Result<usize> {
    let (low, high) = range;
    let input: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .default(default.to_string())
        .validate_with(move |value: &String| -> std::result::Result<(), String> {
            match value.trim().parse::<usize>() {
                Ok(parsed) if (low..=high).contains(&parsed) => Ok(()),
                _ => Err(format!("Use a number between {low} and {high}")),
            }
        })
        .interact_text()
        .context("Failed to read ranking size")?;

    input.trim().parse::<usize>().context("Invalid ranking size")
}
