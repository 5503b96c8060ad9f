use std::sync::Arc;

use quarry::buffer::BufferPool;
use quarry::catalog::MemoryCatalog;
use quarry::common::DEFAULT_BUFFER_POOL_PAGES;
use quarry::storage::disk::{HeapFile, PageStore};
use quarry::storage::log::NullLog;
use quarry::{TableId, TransactionId};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> quarry::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("Quarry - a transactional heap storage engine");
    println!("============================================\n");

    let db_path = std::env::temp_dir().join(format!("quarry-demo-{}.tbl", std::process::id()));
    let table_id = TableId::new(1);

    let heap_file = Arc::new(HeapFile::open(&db_path, table_id)?);
    let catalog = MemoryCatalog::new();
    catalog.add_table(heap_file.clone());
    let pool = BufferPool::new(DEFAULT_BUFFER_POOL_PAGES, Arc::new(catalog), Arc::new(NullLog));
    info!(path = %heap_file.path().display(), "opened heap file");

    // Transaction 1 inserts a few rows and commits
    let t1 = TransactionId::next();
    let rows = [
        b"Hello, World!".as_slice(),
        b"This is Quarry",
        b"A heap file behind a two-phase locking buffer pool",
    ];
    let mut rids = Vec::new();
    for row in &rows {
        let rid = pool.insert_row(t1, table_id, row)?;
        println!("{} inserted {}", t1, rid);
        rids.push(rid);
    }
    pool.commit(t1)?;
    println!("{} committed; table has {} page(s)\n", t1, heap_file.num_pages()?);

    // Transaction 2 deletes a row, then changes its mind
    let t2 = TransactionId::next();
    pool.delete_row(t2, rids[1])?;
    println!("{} deleted {}", t2, rids[1]);
    pool.abort(t2);
    println!("{} aborted\n", t2);

    // Transaction 3 reads everything back
    let t3 = TransactionId::next();
    println!("{} scanning:", t3);
    for row in heap_file.scan(&pool, t3) {
        let row = row?;
        println!("  - {}: {:?}", row.rid, String::from_utf8_lossy(&row.data));
    }
    pool.commit(t3)?;

    std::fs::remove_file(&db_path).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}
