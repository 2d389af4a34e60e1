use covid19_gym::runner::run_with_args;

fn main() -> anyhow::Result<()> {
    let summary = run_with_args()?;
    println!("{summary}");
    Ok(())
}
