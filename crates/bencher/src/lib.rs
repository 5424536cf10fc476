/// A captured message used as benchmark input.
#[derive(Debug, Copy, Clone)]
pub struct Fixture {
    name: &'static str,
    file_name: &'static str,
    content: &'static str,
}

impl Fixture {
    pub const fn new(name: &'static str, file_name: &'static str, content: &'static str) -> Self {
        Self { name, file_name, content }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Splits the content into pieces of `segment` bytes, the way a capture
    /// delivers it.
    pub fn segments(&self, segment: usize) -> Vec<&'static [u8]> {
        self.content.as_bytes().chunks(segment).collect()
    }
}
