use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// One target to `cargo check` as part of the workspace sanity sweep.
struct Target {
    label: &'static str,
    package: &'static str,
    target_triple: Option<&'static str>,
    features: &'static str,
}

const TARGETS: &[Target] = &[
    Target {
        label: "protocol (no_std)",
        package: "protocol",
        target_triple: Some("thumbv6m-none-eabi"),
        features: "",
    },
    Target {
        label: "proto-core (no_std)",
        package: "proto-core",
        target_triple: Some("thumbv6m-none-eabi"),
        features: "",
    },
    Target {
        label: "cpu (hardware, RP2040)",
        package: "cpu",
        target_triple: Some("thumbv6m-none-eabi"),
        features: "hardware",
    },
    Target {
        label: "gpu (hardware, RP2040)",
        package: "gpu",
        target_triple: Some("thumbv6m-none-eabi"),
        features: "hardware",
    },
    Target {
        label: "apu (hardware, RP2040)",
        package: "apu",
        target_triple: Some("thumbv6m-none-eabi"),
        features: "hardware",
    },
    Target {
        label: "cpu (sim, host)",
        package: "cpu",
        target_triple: None,
        features: "sim",
    },
    Target {
        label: "gpu (sim, host)",
        package: "gpu",
        target_triple: None,
        features: "sim",
    },
    Target {
        label: "apu (sim, host)",
        package: "apu",
        target_triple: None,
        features: "sim",
    },
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "Checking all crates...".cyan().bold());
    println!();

    let total_start = Instant::now();

    for target in TARGETS {
        println!("{}", format!("  Checking {}...", target.label).cyan());
        let start = Instant::now();

        let mut args = vec!["check", "-p", target.package];
        if let Some(triple) = target.target_triple {
            args.push("--target");
            args.push(triple);
        }
        if !target.features.is_empty() {
            args.push("--features");
            args.push(target.features);
        }

        let output = Command::new("cargo")
            .args(&args)
            .output()
            .with_context(|| format!("failed to run cargo check for {}", target.label))?;

        if !output.status.success() {
            eprintln!("{}", format!("  FAILED: {}", target.label).red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("{} check failed", target.label);
        }

        println!(
            "{}",
            format!("  ok {} ({:.2}s)", target.label, start.elapsed().as_secs_f64()).green()
        );
    }

    println!();
    println!(
        "{}",
        format!("All checks passed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    Ok(())
}
