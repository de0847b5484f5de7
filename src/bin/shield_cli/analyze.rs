//! Analyze command - jump destinations of contract code

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use shield_core::analysis::{jump_destinations, CodeBitmap};
use shield_core::hasher::keccak256;
use shield_types::encoding::parse_hex_bytes;

#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// Contract code, hex (0x prefix optional)
    pub code: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeOutput {
    code_hash: String,
    code_size: usize,
    instructions: usize,
    jump_destinations: Vec<usize>,
}

impl AnalyzeCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let code = parse_hex_bytes(&self.code, "code")?;
        let bitmap = CodeBitmap::analyze(&code);
        let output = AnalyzeOutput {
            code_hash: keccak256(&code).to_string(),
            code_size: code.len(),
            instructions: (0..code.len() as u64)
                .filter(|pc| bitmap.is_code_segment(*pc))
                .count(),
            jump_destinations: jump_destinations(&code),
        };

        if json_output {
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("\x1b[1mCode hash:\x1b[0m    {}", output.code_hash);
        println!("\x1b[1mCode size:\x1b[0m    {} bytes", output.code_size);
        println!("\x1b[1mInstructions:\x1b[0m {}", output.instructions);
        if output.jump_destinations.is_empty() {
            println!("No jump destinations");
        } else {
            println!("\x1b[1mJump destinations:\x1b[0m");
            for pc in &output.jump_destinations {
                println!("  {:#06x} ({})", pc, pc);
            }
        }
        Ok(())
    }
}
