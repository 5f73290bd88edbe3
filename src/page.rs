use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Error, Field, Result};

/// Element access the controller needs from a page.
///
/// Both calls fail with `ErrorKind::MissingElement` when no element has
/// the requested id.
pub trait Page: Send + Sync {
    /// current value of an editable element
    fn value(&self, id: &str) -> Result<String>;

    /// replace the text content of an element
    fn set_content(&self, id: &str, content: &str) -> Result<()>;
}

impl<P: Page + ?Sized> Page for Arc<P> {
    fn value(&self, id: &str) -> Result<String> {
        (**self).value(id)
    }

    fn set_content(&self, id: &str, content: &str) -> Result<()> {
        (**self).set_content(id, content)
    }
}

/// Page kept in memory, one text slot per element id.
#[derive(Debug, Default)]
pub struct MemoryPage {
    elements: Mutex<HashMap<String, String>>
}

impl MemoryPage {
    /// Empty page without any elements.
    pub fn new() -> Self {
        MemoryPage::default()
    }

    /// Page holding the `dataN_out` and `dataN_in` elements of all four fields.
    pub fn with_fields() -> Self {
        let page = MemoryPage::new();
        for field in Field::ALL.iter() {
            page.insert(&field.output_id(), "");
            page.insert(&field.display_id(), "");
        }
        page
    }

    /// Add an element, or overwrite it if it already exists.
    pub fn insert(&self, id: &str, text: &str) {
        self.lock().insert(id.to_string(), text.to_string());
    }

    pub fn remove(&self, id: &str) -> Option<String> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Edit an existing element in place.
    pub fn update<F>(&self, id: &str, edit: F) -> Result<()>
        where F: FnOnce(&mut String)
    {
        let mut elements = self.lock();
        let text = elements.get_mut(id).ok_or_else(|| Error::missing_element(id))?;
        edit(text);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.elements.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Page for MemoryPage {
    fn value(&self, id: &str) -> Result<String> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::missing_element(id))
    }

    fn set_content(&self, id: &str, content: &str) -> Result<()> {
        self.update(id, |text| {
            text.clear();
            text.push_str(content);
        })
    }
}
