/// Position of one rendered page within an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext {
    pub page_number: usize,
    pub page_count: usize,
}

impl PageContext {
    pub fn new(page_number: usize, page_count: usize) -> Self {
        Self {
            page_number,
            page_count,
        }
    }

    pub fn is_first(&self) -> bool {
        self.page_number == 0
    }

    pub fn is_last(&self) -> bool {
        self.page_number + 1 >= self.page_count
    }
}
