//! Check command implementation.
//!
//! Validates that the host sources the inspector reads are available.

use anyhow::Result;
use faas_inspector::system::COMMAND_ERROR;
use faas_inspector::{validate_config, InspectorConfig};
use std::path::Path;

/// Reports which sources are readable and whether the configuration is valid.
pub fn command_check(config: &InspectorConfig) -> Result<()> {
    println!("🔍 faas-inspector - Host Source Check");
    println!("=====================================");

    let mut all_ok = true;
    let sources = config.host_sources();

    println!("\n📁 Checking proc sources under {}...", sources.proc_root.display());
    for name in ["cpuinfo", "stat", "meminfo", "vmstat"] {
        let path = sources.proc_root.join(name);
        if path.is_file() {
            println!("   ✅ {} readable", path.display());
        } else {
            // Missing sources degrade to missing attributes, not failures
            println!("   ⚠️  {} not available", path.display());
        }
    }

    println!("\n📊 Checking counter parsing...");
    match sources.read_cpu_counters() {
        Ok(Some(snapshot)) => println!("   ✅ CPU counters parsed (ctxt={})", snapshot.context_switches),
        Ok(None) => println!("   ⚠️  CPU counters not available"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }
    match sources.read_page_faults() {
        Ok(Some(snapshot)) => println!("   ✅ Page faults parsed (pgfault={})", snapshot.page_faults),
        Ok(None) => println!("   ⚠️  Page fault counters not available"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n🐧 Checking kernel info commands...");
    let kernel = sources.read_kernel_info();
    for (label, value) in [("uname -a", &kernel.version), ("hostname", &kernel.hostname)] {
        if value == COMMAND_ERROR {
            println!("   ⚠️  {} failed", label);
        } else {
            println!("   ✅ {}: {}", label, value);
        }
    }

    println!("\n📦 Checking container id location...");
    let id_path = &config.container_id_path;
    if id_path.is_file() {
        println!("   ✅ {} exists (warm container)", id_path.display());
    } else if id_path.parent().is_some_and(Path::is_dir) {
        println!("   ✅ {} can be created (cold container)", id_path.display());
    } else {
        println!("   ❌ Parent directory of {} does not exist", id_path.display());
        all_ok = false;
    }

    println!("\n⚙️  Checking configuration...");
    match validate_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
