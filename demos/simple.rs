use ip_geo_lookup::loader::{LoadOptions, load_csv};
use ip_geo_lookup::{LookupResult, LookupService};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Simple ip-geo-lookup Usage Example\n");

    // Load the bundled sample dataset
    let (index, report) = load_csv("data/sample.csv", &LoadOptions::default())?;
    println!("Loaded {} rows ({} skipped)\n", report.rows_read, report.rows_skipped);

    let service = LookupService::new(index);

    let inputs = vec![
        "1.0.0.100",       // Los Angeles
        "1.0.1.50",        // Fuzhou
        "1.0.64.1",        // Tokyo
        "8.8.8.8",         // Mountain View
        "192.168.1.1",     // private, not in the dataset
        "invalid.ip",
        "256.256.256.256",
        "1.2.3",
        "",
    ];

    for ip in inputs {
        match service.lookup(ip) {
            LookupResult::Found(record) => {
                println!(
                    "{:>16} -> {} ({}) {}",
                    ip,
                    record.country,
                    record.country_code,
                    record.city.as_deref().unwrap_or("-")
                );
            }
            LookupResult::NotFound => println!("{:>16} -> not in dataset", ip),
            LookupResult::Invalid(err) => println!("{:>16?} -> invalid ({}): {}", ip, err.kind(), err),
        }
    }

    let stats = service.snapshot().stats();
    println!("\nIndex info:");
    println!("  Ranges:    {}", stats.total_ranges);
    println!("  Addresses: {}", stats.total_addresses);
    println!("  Countries: {}", stats.countries);

    Ok(())
}
