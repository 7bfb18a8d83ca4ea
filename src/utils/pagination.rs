/// Normalised paging window: 1-based page, `per_page` clamped to 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
    pub offset: u64,
}

impl PageWindow {
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
        Self {
            page,
            per_page,
            offset: (page as u64 - 1) * per_page as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(
            PageWindow::new(None, None, 10),
            PageWindow { page: 1, per_page: 10, offset: 0 }
        );
        assert_eq!(PageWindow::new(Some(0), Some(500), 10).per_page, 100);
        assert_eq!(PageWindow::new(Some(3), Some(20), 10).offset, 40);
    }
}
