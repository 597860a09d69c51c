use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building documentation...".cyan().bold());
    println!();

    let start = Instant::now();

    let mut args = vec!["doc", "--workspace", "--no-deps"];
    if open {
        args.push("--open");
    }

    let output = Command::new("cargo")
        .args(&args)
        .output()
        .context("Failed to build documentation")?;

    if !output.status.success() {
        eprintln!("{}", "✗ Documentation build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("Documentation build failed");
    }

    println!(
        "{}",
        format!(
            "✓ Documentation built in {:.2}s",
            start.elapsed().as_secs_f64()
        )
        .green()
    );

    if !open {
        println!();
        println!("   {}", "Entry points:".dimmed());
        println!(
            "   {}",
            "target/doc/capture/index.html      (component core)".dimmed()
        );
        println!(
            "   {}",
            "target/doc/capture_hal/index.html  (driver trait seams)".dimmed()
        );
    }

    println!();

    Ok(())
}
