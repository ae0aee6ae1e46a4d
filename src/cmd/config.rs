//! `herald config` — show the effective configuration.

use anyhow::Result;
use console::style;
use herald::config::Config;
use std::path::Path;

pub fn cmd_config(project_dir: &Path) -> Result<()> {
    let config = Config::load(project_dir)?;

    println!("{}", style("Herald configuration").bold());
    println!(
        "  repo_url           {}",
        config.repo_url.as_deref().unwrap_or("(unset)")
    );
    println!("  base_branch        {}", config.base_branch);
    println!("  backend            {:?}", config.backend);
    println!(
        "  backend_command    {}",
        config.backend_command.as_deref().unwrap_or("(default)")
    );
    println!(
        "  webhook_url        {}",
        config
            .webhook_url
            .as_deref()
            .unwrap_or("(unset, printing to stdout)")
    );
    println!("  thread_id          {}", config.thread_id);
    println!("  delivery           {:?}", config.delivery);
    println!("  classifier         {:?}", config.classifier_mode);
    println!("  narration_marker   {}", config.narration_marker);
    println!(
        "  silence_threshold  {}s (checked every {}s)",
        config.silence_threshold.as_secs(),
        config.silence_check_period.as_secs()
    );
    println!("  hard_deadline      {}s", config.hard_deadline.as_secs());
    println!(
        "  batching           every {}ms, up to {} messages",
        config.batch_interval.as_millis(),
        config.batch_max_size
    );
    println!("  debounce_quiet     {}ms", config.debounce_quiet.as_millis());
    println!("  summarize_batches  {}", config.summarize_batches);
    Ok(())
}
