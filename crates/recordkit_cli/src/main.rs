//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a database (path argument, or in memory when absent).
//! - Seed sample articles into an empty database.
//! - Walk the article pages forward to the end and back to the start.
//!
//! Set `RECORDKIT_LOG_DIR` to an absolute directory to enable file logging.

use log::info;
use recordkit_core::{
    default_log_level, init_logging, open_db, open_db_in_memory, Article, ArticleService,
    KeysetPager, PageDirection, Predicate, RepoError,
};
use std::error::Error;
use std::process::ExitCode;

const SEED_ARTICLES: usize = 25;
const PAGE_SIZE: u32 = 10;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("recordkit: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("RECORDKIT_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let conn = match std::env::args().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let service = ArticleService::new(&conn);

    let mut pager = service.browse(PAGE_SIZE, Predicate::all());
    if pager.refresh_page_count()?.total_items == 0 {
        for n in 1..=SEED_ARTICLES {
            service.publish_article(
                format!("Sample article {n:02}"),
                format!("Body of sample article number {n}."),
            )?;
        }
        info!("event=cli_seed module=cli status=ok articles={SEED_ARTICLES}");
    }

    println!("recordkit_core version={}", recordkit_core::core_version());
    print_page(PageDirection::Current, &pager.current()?);
    for direction in [PageDirection::Next, PageDirection::Previous] {
        while let Some(rows) = step(&mut pager, direction)? {
            print_page(direction, &rows);
        }
    }
    Ok(())
}

/// Runs one page move; running off either end yields `None`.
fn step(
    pager: &mut KeysetPager<'_, Article>,
    direction: PageDirection,
) -> Result<Option<Vec<Article>>, RepoError> {
    match pager.page(direction) {
        Ok(rows) => Ok(Some(rows)),
        Err(RepoError::NoNextPage | RepoError::NoPreviousPage) => Ok(None),
        Err(err) => Err(err),
    }
}

fn print_page(direction: PageDirection, rows: &[Article]) {
    let ids: Vec<String> = rows.iter().map(|article| article.id.to_string()).collect();
    println!("{:>8}: [{}]", direction.as_str(), ids.join(", "));
}
