//! Benchmark utilities for generating sales extracts.

use bytes::Bytes;

const HEADER: &str = "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit";

/// Generate a delimited sales extract with `rows` data rows.
///
/// Keys repeat so that dimensions dedupe to roughly a tenth of the rows:
/// `rows / 10` customers, `rows / 20` products, `rows / 3` orders and at most
/// 365 dates. Values are derived from the row number so runs are comparable.
pub fn generate_sales_csv(rows: usize) -> Bytes {
    let segments = ["Consumer", "Corporate", "Home Office"];
    let ship_modes = ["First Class", "Second Class", "Standard Class", "Same Day"];
    let categories = [
        ("Furniture", "Chairs"),
        ("Office Supplies", "Paper"),
        ("Technology", "Phones"),
    ];

    let customers = (rows / 10).max(1);
    let products = (rows / 20).max(1);
    let orders = (rows / 3).max(1);

    let mut text = String::with_capacity(rows * 200);
    text.push_str(HEADER);
    text.push('\n');

    for i in 0..rows {
        let customer = i % customers;
        let product = i % products;
        let (category, sub_category) = categories[product % categories.len()];
        let day_of_year = (i % 365) as u32;
        let month = day_of_year / 31 % 12 + 1;
        let day = day_of_year % 28 + 1;

        text.push_str(&format!(
            "{row},CA-2024-{order:06},2024-{month:02}-{day:02},,{ship},C-{customer:05},Customer {customer},{segment},United States,City {city},State {state},{postal:05},Central,P-{product:05},{category},{sub_category},Product {product},{sales:.2},{quantity},{discount:.1},{profit:.4}\n",
            row = i + 1,
            order = i % orders,
            ship = ship_modes[i % ship_modes.len()],
            segment = segments[customer % segments.len()],
            city = customer % 50,
            state = customer % 20,
            postal = 10000 + customer % 80000,
            sales = 5.0 + (i % 997) as f64 * 1.37,
            quantity = i % 9 + 1,
            discount = (i % 5) as f64 / 10.0,
            profit = (i % 311) as f64 * 0.731 - 40.0,
        ));
    }

    Bytes::from(text)
}
