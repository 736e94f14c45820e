//! The UI port. Everything the client would do to a browser document goes
//! through [`Page`], so validation, submission and notification logic can be
//! driven by a plain in-memory document.
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    sync::{Mutex, MutexGuard},
};

use tracing::{debug, warn};

use crate::notify::NotificationKind;

/// Identifier of the page region the QR scanner renders into.
pub const SCAN_REGION: &str = "qr-reader";
pub const REGISTRATION_FORM: &str = "registration-form";
pub const TOPUP_FORM: &str = "topup-form";
pub const NOTIFICATION_RESPONSE_FORM: &str = "notification-response-form";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BannerId(u64);

impl fmt::Display for BannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub id: BannerId,
    pub message: String,
    pub kind: NotificationKind,
}

/// Elements may be flagged for one of the toolkit's hover behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    Tooltip,
    Popover,
}

/// The named field values of a form. Missing fields read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: BTreeMap<String, String>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_owned(), value.into());
    }

    pub fn value(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Operations the client needs from a document.
pub trait Page: Send + Sync {
    fn has_element(&self, id: &str) -> bool;

    /// Returns a snapshot of the form's current values.
    fn form(&self, id: &str) -> Option<Form>;

    /// Returns false if either the form or the field does not exist.
    fn set_form_field(&self, form_id: &str, name: &str, value: &str) -> bool;

    /// Submits the form natively. Returns the submitted values.
    fn submit_form(&self, form_id: &str) -> Option<Form>;

    /// Appends a dismissible banner at the end of the body.
    fn append_banner(&self, message: &str, kind: NotificationKind) -> BannerId;

    /// Removes a banner. Returns false if it is already gone.
    fn remove_banner(&self, id: BannerId) -> bool;

    /// Activates the given toggle on every flagged element and returns how
    /// many were activated.
    fn activate_toggles(&self, toggle: Toggle) -> usize;

    fn input_type(&self, id: &str) -> Option<String>;

    fn set_input_type(&self, id: &str, input_type: &str) -> bool;

    fn replace_class(&self, id: &str, old: &str, new: &str) -> bool;
}

/// What happened to a banner, reported to a [`MemoryPage`] observer.
#[derive(Debug, Clone, Copy)]
pub enum BannerEvent<'a> {
    Shown(&'a Banner),
    Removed(BannerId),
}

type Observer = Box<dyn Fn(BannerEvent<'_>) + Send + Sync>;

#[derive(Debug, Default)]
struct Element {
    input_type: Option<String>,
    classes: BTreeSet<String>,
    toggle: Option<Toggle>,
    active: bool,
}

#[derive(Debug, Default)]
struct Document {
    elements: HashMap<String, Element>,
    forms: HashMap<String, Form>,
    banners: Vec<Banner>,
    submitted: Vec<(String, Form)>,
    next_banner: u64,
}

/// An in-memory [`Page`].
#[derive(Default)]
pub struct MemoryPage {
    document: Mutex<Document>,
    observer: Option<Observer>,
}

impl MemoryPage {
    /// Creates an empty [`MemoryPage`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `observer` whenever a banner is shown or removed.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(BannerEvent<'_>) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn with_element(self, id: &str) -> Self {
        self.doc().elements.entry(id.to_owned()).or_default();
        self
    }

    pub fn with_form(self, id: &str, form: Form) -> Self {
        {
            let mut doc = self.doc();
            doc.elements.entry(id.to_owned()).or_default();
            doc.forms.insert(id.to_owned(), form);
        }
        self
    }

    pub fn with_toggle(self, id: &str, toggle: Toggle) -> Self {
        self.doc().elements.entry(id.to_owned()).or_default().toggle = Some(toggle);
        self
    }

    pub fn with_input(self, id: &str, input_type: &str) -> Self {
        self.doc().elements.entry(id.to_owned()).or_default().input_type =
            Some(input_type.to_owned());
        self
    }

    pub fn with_classes(self, id: &str, classes: &[&str]) -> Self {
        self.doc()
            .elements
            .entry(id.to_owned())
            .or_default()
            .classes
            .extend(classes.iter().map(|c| c.to_string()));
        self
    }

    /// Banners currently on the page, oldest first.
    pub fn banners(&self) -> Vec<Banner> {
        self.doc().banners.clone()
    }

    /// Every form submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<(String, Form)> {
        self.doc().submitted.clone()
    }

    pub fn classes(&self, id: &str) -> Vec<String> {
        self.doc()
            .elements
            .get(id)
            .map(|e| e.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.doc().elements.get(id).map_or(false, |e| e.active)
    }

    fn doc(&self) -> MutexGuard<'_, Document> {
        // A panicking observer must not make the page unusable.
        self.document.lock().unwrap_or_else(|poisoned| {
            warn!("page lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn emit(&self, event: BannerEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}

impl Page for MemoryPage {
    fn has_element(&self, id: &str) -> bool {
        self.doc().elements.contains_key(id)
    }

    fn form(&self, id: &str) -> Option<Form> {
        self.doc().forms.get(id).cloned()
    }

    fn set_form_field(&self, form_id: &str, name: &str, value: &str) -> bool {
        match self.doc().forms.get_mut(form_id) {
            Some(form) if form.fields.contains_key(name) => {
                form.set(name, value);
                true
            }
            _ => false,
        }
    }

    fn submit_form(&self, form_id: &str) -> Option<Form> {
        let mut doc = self.doc();
        let form = doc.forms.get(form_id)?.clone();

        debug!("submitting form {form_id:?}");
        doc.submitted.push((form_id.to_owned(), form.clone()));

        Some(form)
    }

    fn append_banner(&self, message: &str, kind: NotificationKind) -> BannerId {
        let banner = {
            let mut doc = self.doc();
            doc.next_banner += 1;

            let banner = Banner {
                id: BannerId(doc.next_banner),
                message: message.to_owned(),
                kind,
            };
            doc.banners.push(banner.clone());
            banner
        };

        self.emit(BannerEvent::Shown(&banner));

        banner.id
    }

    fn remove_banner(&self, id: BannerId) -> bool {
        let removed = {
            let mut doc = self.doc();
            let before = doc.banners.len();
            doc.banners.retain(|b| b.id != id);
            doc.banners.len() != before
        };

        if removed {
            self.emit(BannerEvent::Removed(id));
        }

        removed
    }

    fn activate_toggles(&self, toggle: Toggle) -> usize {
        let mut activated = 0;

        for element in self.doc().elements.values_mut() {
            if element.toggle == Some(toggle) {
                element.active = true;
                activated += 1;
            }
        }

        activated
    }

    fn input_type(&self, id: &str) -> Option<String> {
        self.doc().elements.get(id)?.input_type.clone()
    }

    fn set_input_type(&self, id: &str, input_type: &str) -> bool {
        match self.doc().elements.get_mut(id) {
            Some(element) => {
                element.input_type = Some(input_type.to_owned());
                true
            }
            None => false,
        }
    }

    fn replace_class(&self, id: &str, old: &str, new: &str) -> bool {
        match self.doc().elements.get_mut(id) {
            Some(element) => {
                element.classes.remove(old);
                element.classes.insert(new.to_owned());
                true
            }
            None => false,
        }
    }
}

/// Flips a password input between hidden and visible and swaps the eye icon
/// to match. Returns false if the input is not on the page.
pub fn toggle_password_visibility(page: &dyn Page, input_id: &str, icon_id: &str) -> bool {
    let Some(current) = page.input_type(input_id) else {
        return false;
    };

    if current == "password" {
        page.set_input_type(input_id, "text");
        page.replace_class(icon_id, "fa-eye", "fa-eye-slash");
    } else {
        page.set_input_type(input_id, "password");
        page.replace_class(icon_id, "fa-eye-slash", "fa-eye");
    }

    true
}

/// Fills the notification response form and submits it.
pub fn respond_to_notification(
    page: &dyn Page,
    notification_id: &str,
    response: &str,
) -> Option<Form> {
    if !page.has_element(NOTIFICATION_RESPONSE_FORM) {
        warn!("notification response form is not on the page");
        return None;
    }

    let filled =
        page.set_form_field(NOTIFICATION_RESPONSE_FORM, "notification_id", notification_id)
            && page.set_form_field(NOTIFICATION_RESPONSE_FORM, "response", response);

    if !filled {
        warn!("notification response form is missing its fields");
        return None;
    }

    page.submit_form(NOTIFICATION_RESPONSE_FORM)
}
