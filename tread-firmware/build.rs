//! Build script for tread-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates tread.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Known keys per section
const SECTIONS: &[(&str, &[&str])] = &[
    ("motor", &["left_mult", "right_mult", "max_pwm", "pwm_freq_hz"]),
    (
        "avoid",
        &[
            "fwd_speed",
            "back_speed",
            "turn_steer",
            "clear_mm",
            "near_mm",
            "back_s",
            "turn_s_min",
            "turn_s_max",
            "loop_hz",
        ],
    ),
    ("deadman", &["threshold_s", "period_ms"]),
    ("sensor", &["address", "timeout_ms"]),
];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).expect("create memory.x");
    f.write_all(memory_x).expect("write memory.x");

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate tread.toml at compile time
///
/// Only syntax and key names are checked here; value ranges are checked by
/// the firmware at boot.
fn validate_config() {
    println!("cargo:rerun-if-changed=tread.toml");

    let config_path = Path::new("tread.toml");
    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => panic!("\nERROR: failed to read tread.toml: {}\n", e),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => panic!("\nERROR: invalid TOML syntax in tread.toml:\n{}\n", e),
    };

    let table = match config {
        toml::Value::Table(t) => t,
        _ => panic!("\nERROR: tread.toml must be a table\n"),
    };

    let mut errors = Vec::new();

    for (name, value) in &table {
        let Some((_, keys)) = SECTIONS.iter().find(|(s, _)| s == name) else {
            errors.push(format!("unknown section [{}]", name));
            continue;
        };
        let toml::Value::Table(section) = value else {
            errors.push(format!("[{}] must be a table", name));
            continue;
        };
        for (key, value) in section {
            if !keys.contains(&key.as_str()) {
                errors.push(format!("[{}] unknown key '{}'", name, key));
            } else if !matches!(value, toml::Value::Integer(_) | toml::Value::Float(_)) {
                errors.push(format!("[{}] '{}' must be a number", name, key));
            }
        }
    }

    if !errors.is_empty() {
        panic!(
            "\nERROR: invalid tread.toml\n{}\n",
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=tread.toml validated successfully");
}
