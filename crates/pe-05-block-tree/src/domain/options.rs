//! Variant options, parsed once when the tree is built.

use crate::domain::formula::Formula;
use crate::domain::kind::BlockKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepOptions {
    /// Return to the first child after the last one runs.
    pub cyclic: bool,
}

/// Field filter applied to stored documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldFilter {
    /// Dotted path into the stored document (`option.status`, `document.type`).
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceOptions {
    pub schema: Option<String>,
    pub only_own_documents: bool,
    pub filters: Vec<FieldFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonFilter {
    #[serde(rename = "type")]
    pub filter_type: Option<String>,
    pub field: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonDefinition {
    pub tag: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub button_type: Option<String>,
    pub field: Option<String>,
    pub value: Value,
    pub title: Option<String>,
    pub description: Option<String>,
    pub filters: Option<Vec<ButtonFilter>>,
    pub ui_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonMeta {
    pub buttons: Option<Vec<ButtonDefinition>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonOptions {
    pub ui_meta_data: Option<ButtonMeta>,
}

impl ButtonOptions {
    /// Tags of the configured buttons; these are the block's outputs.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.ui_meta_data
            .as_ref()
            .and_then(|meta| meta.buttons.as_ref())
            .map(|buttons| buttons.iter().filter_map(|b| b.tag.as_deref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresetField {
    pub name: String,
    pub value: Option<String>,
    pub readonly: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum IdType {
    #[serde(rename = "UUID")]
    Uuid,
    #[serde(rename = "OWNER")]
    Owner,
    #[default]
    #[serde(other)]
    None,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestOptions {
    pub schema: Option<String>,
    pub id_type: IdType,
    pub preset_schema: Option<String>,
    pub preset_fields: Vec<PresetField>,
    pub hide_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Equal,
    NotEqual,
    In,
    NotIn,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorCondition {
    pub field: String,
    #[serde(rename = "type")]
    pub condition: ConditionType,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorOptions {
    pub conditions: Vec<ValidatorCondition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpOptions {
    pub url: String,
    pub method: String,
    pub headers: Vec<HttpHeader>,
}

pub const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionUpdate {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendOptions {
    pub entity_type: Option<String>,
    /// Written into `PolicyDocument::option` before saving.
    pub options: Vec<OptionUpdate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionFlow {
    #[default]
    FirstTrue,
    AllTrue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchConditionType {
    #[default]
    Equal,
    NotEqual,
    Unconditional,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchActor {
    #[default]
    #[serde(rename = "")]
    Current,
    Owner,
    Issuer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchCondition {
    pub tag: String,
    #[serde(rename = "type")]
    pub condition: SwitchConditionType,
    pub value: String,
    pub actor: SwitchActor,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchOptions {
    pub execution_flow: ExecutionFlow,
    pub conditions: Vec<SwitchCondition>,
    /// Parsed `value` of each condition; `None` for unconditional ones.
    #[serde(skip)]
    pub formulas: Vec<Option<Formula>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalculateOptions {
    pub output_schema: Option<String>,
    /// `name` = input field, `value` = variable.
    pub input_fields: Vec<FieldMapping>,
    /// `name` = output field, `value` = variable.
    pub output_fields: Vec<FieldMapping>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Equation {
    pub variable: String,
    pub formula: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MathOptions {
    pub equations: Vec<Equation>,
    #[serde(skip)]
    pub compiled: Vec<(String, Formula)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Default,
    Custom,
}

/// Options shared by mint and retirement blocks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenRuleOptions {
    pub token_id: Option<String>,
    pub rule: Option<String>,
    pub account_type: AccountType,
    /// Credential subject field holding the target account when `custom`.
    pub account_id: Option<String>,
    #[serde(skip)]
    pub rule_formula: Option<Formula>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalDataOptions {
    pub schema: Option<String>,
}

/// Executable binding of a block, chosen once per materialization.
#[derive(Debug, Clone)]
pub enum Behavior {
    InterfaceContainer,
    InterfaceStep(StepOptions),
    DocumentsSource(SourceOptions),
    Button(ButtonOptions),
    RequestVcDocument(RequestOptions),
    DocumentValidator(ValidatorOptions),
    HttpRequest(HttpOptions),
    SendToGuardian(SendOptions),
    Switch(SwitchOptions),
    CalculateContainer(CalculateOptions),
    CalculateMathAddon(MathOptions),
    MintDocument(TokenRuleOptions),
    RetirementDocument(TokenRuleOptions),
    ExternalData(ExternalDataOptions),
}

impl Behavior {
    /// Parse `options` for `kind`. Problems are returned as messages and the
    /// variant falls back to its defaults.
    #[must_use]
    pub fn parse(kind: BlockKind, options: &Map<String, Value>) -> (Self, Vec<String>) {
        let mut errors = Vec::new();
        let behavior = match kind {
            BlockKind::InterfaceContainer => Self::InterfaceContainer,
            BlockKind::InterfaceStep => Self::InterfaceStep(decode(options, &mut errors)),
            BlockKind::DocumentsSource => Self::DocumentsSource(decode(options, &mut errors)),
            BlockKind::Button => Self::Button(decode(options, &mut errors)),
            BlockKind::RequestVcDocument => Self::RequestVcDocument(decode(options, &mut errors)),
            BlockKind::DocumentValidator => Self::DocumentValidator(decode(options, &mut errors)),
            BlockKind::HttpRequest => Self::HttpRequest(decode(options, &mut errors)),
            BlockKind::SendToGuardian => Self::SendToGuardian(decode(options, &mut errors)),
            BlockKind::Switch => {
                let mut opts: SwitchOptions = decode(options, &mut errors);
                opts.formulas = opts
                    .conditions
                    .iter()
                    .map(|condition| match condition.condition {
                        SwitchConditionType::Unconditional => None,
                        _ => compile(&condition.value, &mut errors),
                    })
                    .collect();
                Self::Switch(opts)
            }
            BlockKind::CalculateContainer => Self::CalculateContainer(decode(options, &mut errors)),
            BlockKind::CalculateMathAddon => {
                let mut opts: MathOptions = decode(options, &mut errors);
                opts.compiled = opts
                    .equations
                    .iter()
                    .filter_map(|eq| {
                        compile(&eq.formula, &mut errors).map(|formula| (eq.variable.clone(), formula))
                    })
                    .collect();
                Self::CalculateMathAddon(opts)
            }
            BlockKind::MintDocument => Self::MintDocument(token_rule(options, &mut errors)),
            BlockKind::RetirementDocument => {
                Self::RetirementDocument(token_rule(options, &mut errors))
            }
            BlockKind::ExternalData => Self::ExternalData(decode(options, &mut errors)),
        };
        (behavior, errors)
    }

    /// Output names the block can emit besides its static ones.
    #[must_use]
    pub fn dynamic_outputs(&self) -> Vec<&str> {
        match self {
            Self::Button(opts) => opts.tags(),
            Self::Switch(opts) => opts.conditions.iter().map(|c| c.tag.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn decode<T: DeserializeOwned + Default>(options: &Map<String, Value>, errors: &mut Vec<String>) -> T {
    match serde_json::from_value(Value::Object(options.clone())) {
        Ok(value) => value,
        Err(e) => {
            errors.push(format!("Invalid options: {e}"));
            T::default()
        }
    }
}

fn compile(source: &str, errors: &mut Vec<String>) -> Option<Formula> {
    match Formula::parse(source) {
        Ok(formula) => Some(formula),
        Err(e) => {
            errors.push(format!("Incorrect formula: {source} ({e})"));
            None
        }
    }
}

fn token_rule(options: &Map<String, Value>, errors: &mut Vec<String>) -> TokenRuleOptions {
    let mut opts: TokenRuleOptions = decode(options, errors);
    opts.rule_formula = opts.rule.as_deref().and_then(|rule| compile(rule, errors));
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_switch_conditions_compile() {
        let (behavior, errors) = Behavior::parse(
            BlockKind::Switch,
            &options(json!({
                "executionFlow": "allTrue",
                "conditions": [
                    {"tag": "Condition_0", "type": "equal", "value": "amount > 5"},
                    {"tag": "Condition_1", "type": "unconditional"}
                ]
            })),
        );
        assert!(errors.is_empty());
        let Behavior::Switch(opts) = behavior else {
            panic!("expected switch");
        };
        assert_eq!(opts.execution_flow, ExecutionFlow::AllTrue);
        assert!(opts.formulas[0].is_some());
        assert!(opts.formulas[1].is_none());
    }

    #[test]
    fn test_bad_formula_is_reported() {
        let (_, errors) = Behavior::parse(
            BlockKind::CalculateMathAddon,
            &options(json!({"equations": [{"variable": "x", "formula": "a +"}]})),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Incorrect formula: a +"));
    }

    #[test]
    fn test_malformed_options_fall_back_to_defaults() {
        let (behavior, errors) =
            Behavior::parse(BlockKind::HttpRequest, &options(json!({"headers": "nope"})));
        assert_eq!(errors.len(), 1);
        assert!(matches!(behavior, Behavior::HttpRequest(ref o) if o.url.is_empty()));
    }

    #[test]
    fn test_button_tags_are_outputs() {
        let (behavior, _) = Behavior::parse(
            BlockKind::Button,
            &options(json!({"uiMetaData": {"buttons": [{"tag": "Option_0"}, {"tag": "Option_1"}]}})),
        );
        assert_eq!(behavior.dynamic_outputs(), vec!["Option_0", "Option_1"]);
    }
}
