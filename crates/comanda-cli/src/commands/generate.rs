//! `comanda generate <out.yaml> "<prompt>"` — write a single-step workflow
//! skeleton the caller can expand by hand. Full prompt-to-YAML synthesis is
//! out of scope; this just saves the round trip of hand-typing the schema.

use anyhow::{Context, Result};

pub async fn run(out: &str, prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("prompt must not be empty");
    }
    let skeleton = format!(
        "step:\n  input: STDIN\n  model: NA\n  action: \"{}\"\n  output: STDOUT\n",
        prompt.replace('"', "\\\"")
    );
    std::fs::write(out, skeleton).with_context(|| format!("writing {out}"))?;
    println!("wrote {out}");
    Ok(())
}
