//! Shopping-list PDF rendering
//!
//! Renders the consolidated shopping list as a three-column table
//! (ingredient, amount, unit) into a PDF document returned as bytes.
//! Long lists flow onto additional pages.

use anyhow::Result;
use printpdf::{BuiltinFont, Mm, PdfDocument};

use crate::models::ShoppingListItem;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP_MARGIN: f32 = 20.0;
const BOTTOM_MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 8.0;

const COL_NAME: f32 = 20.0;
const COL_AMOUNT: f32 = 120.0;
const COL_UNIT: f32 = 155.0;

/// Render the shopping list into PDF bytes.
pub fn render_pdf(items: &[ShoppingListItem]) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        "Shopping list",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow::anyhow!("Failed to load font: {}", e))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow::anyhow!("Failed to load font: {}", e))?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - TOP_MARGIN;

    current.use_text("Shopping list", 16.0, Mm(COL_NAME), Mm(y), &bold);
    y -= ROW_HEIGHT * 1.5;

    current.use_text("Ingredient", 12.0, Mm(COL_NAME), Mm(y), &bold);
    current.use_text("Amount", 12.0, Mm(COL_AMOUNT), Mm(y), &bold);
    current.use_text("Unit", 12.0, Mm(COL_UNIT), Mm(y), &bold);
    y -= ROW_HEIGHT;

    for item in items {
        if y < BOTTOM_MARGIN {
            let (next_page, next_layer) =
                doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            current = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_HEIGHT - TOP_MARGIN;
        }

        current.use_text(&item.name, 11.0, Mm(COL_NAME), Mm(y), &font);
        current.use_text(
            item.total_amount.to_string(),
            11.0,
            Mm(COL_AMOUNT),
            Mm(y),
            &font,
        );
        current.use_text(&item.measurement_unit, 11.0, Mm(COL_UNIT), Mm(y), &font);
        y -= ROW_HEIGHT;
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| anyhow::anyhow!("Failed to serialize PDF: {}", e))?;

    Ok(bytes)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn item_strategy() -> impl Strategy<Value = ShoppingListItem> {
        ("[a-z ]{1,30}", 1i64..100_000, "[a-z]{1,10}").prop_map(|(name, amount, unit)| {
            ShoppingListItem {
                name,
                measurement_unit: unit,
                total_amount: amount,
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn property_render_never_fails_on_ascii_items(
            items in prop::collection::vec(item_strategy(), 0..60)
        ) {
            let bytes = render_pdf(&items).expect("render");
            prop_assert!(bytes.starts_with(b"%PDF"));
        }
    }
}
