use serde::Serialize;

/// Records shown per list page.
pub const PAGE_SIZE: usize = 10;

/// One slice of an ordered sequence, with the metadata list endpoints need
/// to render next/previous controls.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Slices `items` into the requested page. The page parameter comes straight
/// from the query string: anything that is not a positive integer degrades to
/// page 1, and a number past the end clamps to the last page. An empty input
/// yields a single empty page rather than an error.
pub fn paginate<T>(items: Vec<T>, page: Option<&str>) -> Page<T> {
    let total_items = items.len();
    let total_pages = std::cmp::max(1, total_items.div_ceil(PAGE_SIZE));

    let requested = page
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(1);
    let number = std::cmp::min(requested, total_pages);

    let items = items
        .into_iter()
        .skip((number - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();

    Page {
        items,
        number,
        total_pages,
        total_items,
        has_next: number < total_pages,
        has_previous: number > 1,
    }
}
