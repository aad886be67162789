//! Code classification lookup

use anyhow::Result;
use erh_core::explain_code;

pub fn cmd_classify(codes: &[String]) -> Result<()> {
    println!();
    println!("🏷️  Code Categories");
    println!("   {:24} │ {:14} │ Category", "Code", "Rule");
    println!("   ─────────────────────────┼────────────────┼──────────────────────────");

    for code in codes {
        let (rule, group) = explain_code(Some(code));
        println!("   {:24} │ {:14} │ {}", super::truncate(code, 24), rule, group);
    }

    Ok(())
}
