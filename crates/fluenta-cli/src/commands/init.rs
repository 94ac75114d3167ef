//! The `fluenta init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create fluenta.toml
    if std::path::Path::new("fluenta.toml").exists() {
        println!("fluenta.toml already exists, skipping.");
    } else {
        std::fs::write("fluenta.toml", SAMPLE_CONFIG)?;
        println!("Created fluenta.toml");
    }

    // Create example item bank
    std::fs::create_dir_all("banks")?;
    let example_path = std::path::Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit fluenta.toml with your grader API key");
    println!("  2. Run: fluenta validate --bank banks/example.toml");
    println!("  3. Run: fluenta simulate --bank banks/example.toml --theta 0.5");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# fluenta configuration

default_grader = "http"
bank_dir = "./banks"
session_dir = "./fluenta-sessions"

[graders.http]
type = "http"
api_key = "${FLUENTA_GRADER_KEY}"
base_url = "https://grader.example.com"

[graders.mock]
type = "mock"
band = 6.0

[skills.reading]
se_target = 0.3
min_items = 10
max_items = 30
time_budget_secs = 1200

[skills.reading.blueprint]
gist = 2
detail = 2

[skills.listening]
se_target = 0.3
min_items = 10
max_items = 30
time_budget_secs = 1200
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example Item Bank"
description = "A small calibrated pool to get started"

[[items]]
id = "read-001"
skill = "reading"
difficulty = -1.8
discrimination = 1.1
guessing = 0.25
tags = ["gist"]

[[items]]
id = "read-002"
skill = "reading"
difficulty = -0.9
discrimination = 0.95
guessing = 0.25
tags = ["detail"]

[[items]]
id = "read-003"
skill = "reading"
difficulty = 0.0
discrimination = 1.2
guessing = 0.25
tags = ["gist"]

[[items]]
id = "read-004"
skill = "reading"
difficulty = 0.8
discrimination = 1.0
guessing = 0.25
tags = ["detail"]

[[items]]
id = "read-005"
skill = "reading"
difficulty = 1.7
discrimination = 1.15
guessing = 0.25
tags = ["inference"]

[[items]]
id = "listen-001"
skill = "listening"
difficulty = -1.5
discrimination = 1.0
guessing = 0.25
tags = ["gist"]

[[items]]
id = "listen-002"
skill = "listening"
difficulty = -0.4
discrimination = 1.05
guessing = 0.25
tags = ["detail"]

[[items]]
id = "listen-003"
skill = "listening"
difficulty = 0.6
discrimination = 0.9
guessing = 0.25
tags = ["gist"]

[[items]]
id = "listen-004"
skill = "listening"
difficulty = 1.4
discrimination = 1.1
guessing = 0.25
tags = ["inference"]
"#;
