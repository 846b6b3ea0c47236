//! The three-step order wizard.
//!
//! Step 1 collects free-form parameters and an optional file, step 2 a
//! layout choice, step 3 hardware choice, delivery and contact data. Partial
//! input lives in the per-product session entry between steps and is
//! consumed at submission. Apart from the missing-name/phone gate, every
//! malformed input degrades to a safe default instead of failing.

use crate::config::FieldLimits;
use crate::sanitize::{resolve_owned_id, truncate};
use crate::session::WizardState;
use crate::store::{CatalogStore, StoreError};
use crate::AppState;
use stampdesk_model::{
    is_simplified_slug, HasId, Layout, NewOrder, PriceOption, Product, DEFAULT_LAYOUT_PRICE,
    DELIVERY_FEE,
};
use std::collections::BTreeMap;

/// Form fields carrying this prefix are collected into the open-ended
/// per-category parameter mapping.
pub(crate) const PARAM_PREFIX: &str = "param_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Collect,
    Layout,
    Checkout,
}

impl Step {
    /// Step 1 is the default for an absent or unrecognized step value.
    pub(crate) fn from_query(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("2") => Self::Layout,
            Some("3") => Self::Checkout,
            _ => Self::Collect,
        }
    }

    pub(crate) const fn number(self) -> u8 {
        match self {
            Self::Collect => 1,
            Self::Layout => 2,
            Self::Checkout => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FilePart {
    pub field: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// A decoded multipart submission: text fields plus uploaded file parts.
#[derive(Debug, Default)]
pub(crate) struct SubmittedForm {
    pub fields: BTreeMap<String, String>,
    pub files: Vec<FilePart>,
}

impl SubmittedForm {
    pub(crate) fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub(crate) fn non_empty(&self, name: &str) -> Option<&str> {
        self.value(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub(crate) fn checkbox(&self, name: &str) -> bool {
        self.value(name) == Some("on")
    }

    pub(crate) fn file(&self, field: &str) -> Option<&FilePart> {
        self.files
            .iter()
            .find(|f| f.field == field && !f.file_name.trim().is_empty())
    }
}

/// Everything about the product the wizard branches on, loaded once per
/// request. `simplified` is a pure function of the category slug.
pub(crate) struct WizardContext {
    pub product: Product,
    pub layouts: Vec<Layout>,
    pub price_options: Vec<PriceOption>,
    pub simplified: bool,
}

impl WizardContext {
    pub(crate) async fn load(
        store: &dyn CatalogStore,
        product_id: i64,
    ) -> Result<Option<Self>, StoreError> {
        let Some(product) = store.product(product_id).await? else {
            return Ok(None);
        };
        let simplified = store
            .category(product.category_id)
            .await?
            .is_some_and(|c| is_simplified_slug(&c.slug));
        let layouts = store.layouts_for_product(product.id).await?;
        let price_options = store.price_options_for_product(product.id).await?;
        Ok(Some(Self {
            product,
            layouts,
            price_options,
            simplified,
        }))
    }

    pub(crate) fn first_layout_id(&self) -> Option<i64> {
        self.layouts.first().map(HasId::id)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Redirect {
        step: u8,
        layout_id: Option<i64>,
        flag: Option<&'static str>,
    },
    Submitted {
        order_id: i64,
    },
}

pub(crate) fn collect_params(
    fields: &BTreeMap<String, String>,
    limits: &FieldLimits,
) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for (key, value) in fields {
        if let Some(name) = key.strip_prefix(PARAM_PREFIX) {
            if !name.is_empty() && !value.is_empty() {
                params.insert(name.to_string(), truncate(Some(value), limits.param_value));
            }
        }
    }
    params.insert(
        "message".to_string(),
        truncate(fields.get("message").map(String::as_str), limits.step1_message),
    );
    params
}

/// Zero when the product skips layouts entirely; otherwise the chosen
/// layout's price, falling back to the fixed default when none resolved.
pub(crate) fn layout_price_term(
    simplified: bool,
    has_layouts: bool,
    chosen_price: Option<i64>,
) -> i64 {
    if simplified || !has_layouts {
        0
    } else {
        chosen_price.unwrap_or(DEFAULT_LAYOUT_PRICE)
    }
}

pub(crate) fn compute_total(layout_term: i64, option_price: i64, needs_delivery: bool) -> i64 {
    layout_term + option_price + if needs_delivery { DELIVERY_FEE } else { 0 }
}

/// Serializes the accumulated params; over the cap the whole mapping is
/// replaced by an empty object, never rejected.
pub(crate) fn encode_params(params: &BTreeMap<String, String>, max_len: usize) -> String {
    let encoded = serde_json::to_string(params).unwrap_or_else(|_| "{}".to_string());
    if encoded.chars().count() > max_len {
        "{}".to_string()
    } else {
        encoded
    }
}

async fn save_upload(state: &AppState, form: &SubmittedForm, field: &str) -> String {
    match form.file(field) {
        Some(part) => state
            .uploads
            .save(&part.file_name, &part.data)
            .await
            .unwrap_or_default(),
        None => String::new(),
    }
}

pub(crate) async fn submit_collect(
    state: &AppState,
    session_id: &str,
    ctx: &WizardContext,
    form: &SubmittedForm,
) -> StepOutcome {
    let params = collect_params(&form.fields, &state.config.limits);
    let file_path = save_upload(state, form, "file_step1").await;
    let mut wizard = WizardState {
        params,
        file_path,
        layout_id: String::new(),
    };

    if ctx.simplified {
        let layout_id = ctx.first_layout_id();
        wizard.layout_id = layout_id.map(|id| id.to_string()).unwrap_or_default();
        state.sessions.set(session_id, ctx.product.id, wizard).await;
        return StepOutcome::Redirect {
            step: 3,
            layout_id,
            flag: None,
        };
    }
    if ctx.layouts.is_empty() {
        state.sessions.set(session_id, ctx.product.id, wizard).await;
        return StepOutcome::Redirect {
            step: 3,
            layout_id: None,
            flag: None,
        };
    }
    state.sessions.set(session_id, ctx.product.id, wizard).await;
    StepOutcome::Redirect {
        step: 2,
        layout_id: None,
        flag: None,
    }
}

pub(crate) async fn submit_layout(
    state: &AppState,
    session_id: &str,
    ctx: &WizardContext,
    form: &SubmittedForm,
) -> StepOutcome {
    let mut wizard = state
        .sessions
        .get(session_id, ctx.product.id)
        .await
        .unwrap_or_default();
    let chosen = resolve_owned_id(form.non_empty("layout_id"), &ctx.layouts);
    wizard.layout_id = chosen.map(|id| id.to_string()).unwrap_or_default();
    state.sessions.set(session_id, ctx.product.id, wizard).await;
    StepOutcome::Redirect {
        step: 3,
        layout_id: chosen,
        flag: None,
    }
}

pub(crate) async fn submit_checkout(
    state: &AppState,
    session_id: &str,
    ctx: &WizardContext,
    form: &SubmittedForm,
) -> Result<StepOutcome, StoreError> {
    let wizard = state
        .sessions
        .pop(session_id, ctx.product.id)
        .await
        .unwrap_or_default();

    // Form wins over session; a candidate that fails ownership falls back
    // to the product's first layout, no candidate at all resolves to none.
    let layout_candidate = form
        .non_empty("layout_id")
        .map(str::to_string)
        .or_else(|| (!wizard.layout_id.is_empty()).then(|| wizard.layout_id.clone()));
    let layout_id = layout_candidate
        .as_deref()
        .and_then(|raw| resolve_owned_id(Some(raw), &ctx.layouts));

    let mut option_candidate = form.non_empty("price_option_id").map(str::to_string);
    if ctx.simplified && option_candidate.is_none() {
        option_candidate = ctx.price_options.first().map(|p| p.id.to_string());
    }
    let price_option_id = option_candidate
        .as_deref()
        .and_then(|raw| resolve_owned_id(Some(raw), &ctx.price_options));

    let limits = &state.config.limits;
    let name = truncate(form.value("name"), limits.name);
    let phone = truncate(form.value("phone"), limits.phone);
    let email = truncate(form.value("email"), limits.email);
    let message_source = form
        .value("message")
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| wizard.params.get("message").cloned());
    let message = truncate(message_source.as_deref(), limits.message);
    let delivery_datetime = truncate(form.value("delivery_datetime"), limits.delivery_datetime);
    let delivery_address = truncate(form.value("delivery_address"), limits.address);

    if name.is_empty() || phone.is_empty() {
        // The gate: nothing is lost, the entry goes back for a retry.
        state.sessions.set(session_id, ctx.product.id, wizard).await;
        return Ok(StepOutcome::Redirect {
            step: 3,
            layout_id: None,
            flag: Some("contact_required"),
        });
    }

    let chosen_layout = layout_id.and_then(|id| ctx.layouts.iter().find(|l| l.id == id));
    let chosen_option = price_option_id.and_then(|id| ctx.price_options.iter().find(|p| p.id == id));
    let layout_term = layout_price_term(
        ctx.simplified,
        !ctx.layouts.is_empty(),
        chosen_layout.map(|l| l.price),
    );
    let option_price = chosen_option.map_or(0, |p| p.price_normal);
    let needs_delivery = form.checkbox("needs_delivery");
    let total = compute_total(layout_term, option_price, needs_delivery);

    let file_path_step3 = save_upload(state, form, "file").await;
    let params_json = encode_params(&wizard.params, limits.params_json);

    let order = NewOrder {
        product_id: Some(ctx.product.id),
        layout_id: if ctx.simplified { None } else { layout_id },
        price_option_id,
        total_price: Some(total),
        name,
        phone,
        email,
        order_type: String::new(),
        mount_type: String::new(),
        message,
        file_path: wizard.file_path.clone(),
        file_path_step3,
        params_json,
        needs_delivery,
        delivery_datetime,
        delivery_address,
    };
    let order_id = state.store.insert_order(order).await?;
    crate::notify::dispatch_for_order(state, order_id).await;
    Ok(StepOutcome::Submitted { order_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_parsing_defaults_to_one() {
        assert_eq!(Step::from_query(None), Step::Collect);
        assert_eq!(Step::from_query(Some("")), Step::Collect);
        assert_eq!(Step::from_query(Some("abc")), Step::Collect);
        assert_eq!(Step::from_query(Some("1")), Step::Collect);
        assert_eq!(Step::from_query(Some("2")), Step::Layout);
        assert_eq!(Step::from_query(Some("3")), Step::Checkout);
    }

    #[test]
    fn params_collection_strips_prefix_and_clamps() {
        let limits = FieldLimits::default();
        let mut fields = BTreeMap::new();
        fields.insert("param_city".to_string(), "Tyumen".to_string());
        fields.insert("param_empty".to_string(), String::new());
        fields.insert("param_long".to_string(), "x".repeat(600));
        fields.insert("unrelated".to_string(), "ignored".to_string());
        fields.insert("message".to_string(), "  note  ".to_string());

        let params = collect_params(&fields, &limits);
        assert_eq!(params.get("city").map(String::as_str), Some("Tyumen"));
        assert!(!params.contains_key("empty"));
        assert_eq!(params.get("long").map(String::len), Some(500));
        assert!(!params.contains_key("unrelated"));
        assert_eq!(params.get("message").map(String::as_str), Some("note"));
    }

    #[test]
    fn params_collection_always_carries_a_message_key() {
        let limits = FieldLimits::default();
        let params = collect_params(&BTreeMap::new(), &limits);
        assert_eq!(params.get("message").map(String::as_str), Some(""));
    }

    #[test]
    fn layout_term_is_zero_for_simplified_or_layoutless_products() {
        assert_eq!(layout_price_term(true, true, Some(900)), 0);
        assert_eq!(layout_price_term(false, false, None), 0);
        assert_eq!(layout_price_term(false, true, Some(900)), 900);
        assert_eq!(layout_price_term(false, true, None), DEFAULT_LAYOUT_PRICE);
    }

    #[test]
    fn total_covers_every_term_combination() {
        assert_eq!(compute_total(0, 0, false), 0);
        assert_eq!(compute_total(750, 0, false), 750);
        assert_eq!(compute_total(0, 800, false), 800);
        assert_eq!(compute_total(0, 0, true), DELIVERY_FEE);
        assert_eq!(compute_total(750, 800, true), 2050);
    }

    #[test]
    fn oversized_params_serialize_to_empty_object() {
        let mut params = BTreeMap::new();
        params.insert("key".to_string(), "v".repeat(64));
        assert_eq!(encode_params(&params, 10), "{}");
        let small = encode_params(&params, 10_000);
        assert!(small.contains("key"));
    }

    #[test]
    fn form_checkbox_matches_on_literal() {
        let mut form = SubmittedForm::default();
        form.fields
            .insert("needs_delivery".to_string(), "on".to_string());
        assert!(form.checkbox("needs_delivery"));
        form.fields
            .insert("needs_delivery".to_string(), "true".to_string());
        assert!(!form.checkbox("needs_delivery"));
    }
}
