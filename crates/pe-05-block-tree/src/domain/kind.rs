//! Closed set of block variants and their `about` records.

use serde::Serialize;
use shared_types::entities::output_events::{
    ERROR_EVENT, REFRESH_EVENT, RELEASE_EVENT, RUN_EVENT,
};
use shared_types::entities::InputEventType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capability {
    DataSource,
    Interactive,
    Action,
    Validator,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChildrenType {
    None,
    Any,
    /// Only addons of the parent (validators, math addons).
    Special,
}

/// Static description of a block variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAbout {
    pub label: &'static str,
    pub capabilities: &'static [Capability],
    pub children: ChildrenType,
    pub input: &'static [InputEventType],
    pub output: &'static [&'static str],
    /// Output names come from options (button tags, switch conditions).
    pub dynamic_output: bool,
    /// Adds an implicit `RunEvent` edge to the next sibling.
    pub default_event: bool,
    /// Has per-user `active` state.
    pub stateful: bool,
}

impl BlockAbout {
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    #[must_use]
    pub fn accepts(&self, input: InputEventType) -> bool {
        self.input.contains(&input)
    }
}

const ACTION_OUTPUTS: &[&str] = &[RUN_EVENT, REFRESH_EVENT, RELEASE_EVENT, ERROR_EVENT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockKind {
    InterfaceContainer,
    InterfaceStep,
    DocumentsSource,
    Button,
    RequestVcDocument,
    DocumentValidator,
    HttpRequest,
    SendToGuardian,
    Switch,
    CalculateContainer,
    CalculateMathAddon,
    MintDocument,
    RetirementDocument,
    ExternalData,
}

impl BlockKind {
    pub const ALL: [BlockKind; 14] = [
        Self::InterfaceContainer,
        Self::InterfaceStep,
        Self::DocumentsSource,
        Self::Button,
        Self::RequestVcDocument,
        Self::DocumentValidator,
        Self::HttpRequest,
        Self::SendToGuardian,
        Self::Switch,
        Self::CalculateContainer,
        Self::CalculateMathAddon,
        Self::MintDocument,
        Self::RetirementDocument,
        Self::ExternalData,
    ];

    #[must_use]
    pub fn from_block_type(block_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.block_type() == block_type)
    }

    #[must_use]
    pub fn block_type(&self) -> &'static str {
        match self {
            Self::InterfaceContainer => "interfaceContainerBlock",
            Self::InterfaceStep => "interfaceStepBlock",
            Self::DocumentsSource => "interfaceDocumentsSourceBlock",
            Self::Button => "buttonBlock",
            Self::RequestVcDocument => "requestVcDocumentBlock",
            Self::DocumentValidator => "documentValidatorBlock",
            Self::HttpRequest => "httpRequestBlock",
            Self::SendToGuardian => "sendToGuardianBlock",
            Self::Switch => "switchBlock",
            Self::CalculateContainer => "calculateContainerBlock",
            Self::CalculateMathAddon => "calculateMathAddon",
            Self::MintDocument => "mintDocumentBlock",
            Self::RetirementDocument => "retirementDocumentBlock",
            Self::ExternalData => "externalDataBlock",
        }
    }

    #[must_use]
    pub fn about(&self) -> BlockAbout {
        use Capability::*;
        use InputEventType::{RefreshEvent, RestoreEvent, RunEvent};

        let base = BlockAbout {
            label: "",
            capabilities: &[],
            children: ChildrenType::None,
            input: &[RunEvent],
            output: ACTION_OUTPUTS,
            dynamic_output: false,
            default_event: true,
            stateful: false,
        };
        match self {
            Self::InterfaceContainer => BlockAbout {
                label: "Container",
                capabilities: &[Container, Interactive],
                children: ChildrenType::Any,
                input: &[RefreshEvent],
                output: &[REFRESH_EVENT],
                default_event: false,
                ..base
            },
            Self::InterfaceStep => BlockAbout {
                label: "Step",
                capabilities: &[Container, Interactive],
                children: ChildrenType::Any,
                input: &[RunEvent, RefreshEvent],
                output: &[RUN_EVENT, REFRESH_EVENT],
                default_event: false,
                ..base
            },
            Self::DocumentsSource => BlockAbout {
                label: "Documents",
                capabilities: &[DataSource, Interactive],
                input: &[RefreshEvent],
                output: &[REFRESH_EVENT],
                default_event: false,
                ..base
            },
            Self::Button => BlockAbout {
                label: "Button",
                capabilities: &[Interactive],
                children: ChildrenType::Special,
                output: &[],
                dynamic_output: true,
                default_event: false,
                ..base
            },
            Self::RequestVcDocument => BlockAbout {
                label: "Request",
                capabilities: &[Interactive, Action],
                children: ChildrenType::Special,
                input: &[RunEvent, RefreshEvent, RestoreEvent],
                output: &[RUN_EVENT, REFRESH_EVENT, RELEASE_EVENT],
                stateful: true,
                ..base
            },
            Self::DocumentValidator => BlockAbout {
                label: "Validator",
                capabilities: &[Validator],
                output: &[RUN_EVENT, REFRESH_EVENT, RELEASE_EVENT],
                ..base
            },
            Self::HttpRequest => BlockAbout {
                label: "Request data",
                capabilities: &[Action],
                ..base
            },
            Self::SendToGuardian => BlockAbout {
                label: "Send",
                capabilities: &[Action],
                ..base
            },
            Self::Switch => BlockAbout {
                label: "Switch",
                capabilities: &[Action],
                output: &[],
                dynamic_output: true,
                default_event: false,
                ..base
            },
            Self::CalculateContainer => BlockAbout {
                label: "Calculate",
                capabilities: &[Action, Container],
                children: ChildrenType::Special,
                ..base
            },
            Self::CalculateMathAddon => BlockAbout {
                label: "Math Addon",
                input: &[],
                output: &[],
                default_event: false,
                ..base
            },
            Self::MintDocument => BlockAbout {
                label: "Mint",
                capabilities: &[Action],
                ..base
            },
            Self::RetirementDocument => BlockAbout {
                label: "Retirement",
                capabilities: &[Action],
                ..base
            },
            Self::ExternalData => BlockAbout {
                label: "External Data",
                capabilities: &[DataSource],
                input: &[],
                output: &[RUN_EVENT, REFRESH_EVENT, RELEASE_EVENT],
                ..base
            },
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.block_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_type_names_round_trip() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::from_block_type(kind.block_type()), Some(kind));
        }
        assert_eq!(BlockKind::from_block_type("aggregateDocumentBlock"), None);
    }

    #[test]
    fn test_about_records() {
        let request = BlockKind::RequestVcDocument.about();
        assert!(request.accepts(InputEventType::RestoreEvent));
        assert!(request.stateful);
        assert!(request.has(Capability::Interactive));

        let button = BlockKind::Button.about();
        assert!(button.dynamic_output);
        assert!(!button.default_event);
    }
}
