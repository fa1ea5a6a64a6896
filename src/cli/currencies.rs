use super::ui;
use crate::resolver::{RateResolver, SupportedCurrency};
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(resolver: &RateResolver<'_>) -> Result<()> {
    let spinner = ui::new_spinner("Fetching supported currencies...");
    let currencies = resolver.supported_currencies().await;
    spinner.finish_and_clear();

    println!(
        "\n{}",
        ui::style_text("Supported currencies", ui::StyleType::Title)
    );
    println!("{}", display_currencies(&currencies));
    println!(
        "{}",
        ui::style_text(
            &format!("{} currencies available.", currencies.len()),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}

fn display_currencies(currencies: &[SupportedCurrency]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Kind"),
    ]);
    for currency in currencies {
        table.add_row(vec![
            Cell::new(currency.code.code()),
            Cell::new(&currency.name),
            Cell::new(currency.code.kind().to_string()),
        ]);
    }
    table.to_string()
}
