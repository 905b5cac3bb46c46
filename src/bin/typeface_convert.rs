// CLI tool to convert a font file into typeface JSON
use std::env;

use typeface_rs::{Font, ParseOptions, parse_typeface};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <font.ttf|otf|woff> [characters]", args[0]);
        eprintln!();
        eprintln!("Convert a font file into a typeface record, printed as JSON.");
        eprintln!("With a second argument, only those characters are converted.");
        std::process::exit(1);
    }

    let font_path = &args[1];
    let data = std::fs::read(font_path)?;

    let font = Font::from_data(data.clone())?;
    eprintln!("Font: {}", font.family_name()?);
    eprintln!("  Units per EM: {}", font.units_per_em()?);
    eprintln!("  Glyphs: {}", font.num_glyphs()?);
    if let Ok(bold) = font.is_bold() {
        eprintln!("  Bold: {}", bold);
    }
    if let Ok(italic) = font.is_italic() {
        eprintln!("  Italic: {}", italic);
    }

    let options = ParseOptions {
        characters: args.get(2).map(|s| s.chars().collect()),
        ..ParseOptions::default()
    };

    let record = parse_typeface(data, &options)?;
    eprintln!(
        "  Converted {} glyphs ({} errors, {} mapped)",
        record.meta.converted_glyphs, record.meta.error_glyphs, record.meta.total_mapped
    );

    println!("{}", record.to_json()?);
    Ok(())
}
