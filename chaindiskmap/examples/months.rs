use chaindiskmap::hash::djb;
use chaindiskmap::{ChainHashMap, Cursor};
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

fn print_table<H>(map: &ChainHashMap<H>) {
    let mut cursor = Cursor::new();
    while let Some((key, value)) = map.iterate(&mut cursor) {
        let month = i32::from_ne_bytes(value.try_into().expect("month values are 4 bytes"));
        println!("{month:<2}: {}", String::from_utf8_lossy(key));
    }
}

fn main() -> chaindiskmap::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // one bucket to start with, so the table has to grow as months go in
    let mut map = ChainHashMap::new(1, djb)?;
    for (i, month) in MONTHS.iter().enumerate() {
        map.put(month, (i as i32 + 1).to_ne_bytes())?;
    }
    print_table(&map);
    println!("{}\n", map.diagnostics());

    println!("\tNow testing sync-ing");
    let dir = tempdir()?;
    let path = dir.path().join("months.chm");
    map.save(&path)?;
    drop(map);

    let map = ChainHashMap::open_path(&path, djb)?;
    print_table(&map);
    println!("{}", map.diagnostics());

    let july = map.get("July")?;
    assert_eq!(i32::from_ne_bytes(july.try_into().expect("4 bytes")), 7);
    Ok(())
}
