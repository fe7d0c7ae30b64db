use bindscope_plugin::DeclarationFile;
use std::io::Write;

pub fn run(out: &mut dyn Write) -> anyhow::Result<()> {
    let schema = schemars::schema_for!(DeclarationFile);
    writeln!(out, "{}", serde_json::to_string_pretty(&schema)?)?;
    Ok(())
}
