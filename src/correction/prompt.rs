//! Feedback prompt construction for the correction loop.
//!
//! Two strategies, one per artifact kind. Domain repair rebuilds a dedicated
//! repair prompt from the whole round history; interface repair keeps
//! appending error sentences to the growing generation prompt. Either way the
//! model always sees every earlier diagnostic.

use super::CorrectionRecord;

/// Repair preamble shown before the round history when fixing a domain.
pub const DOMAIN_REPAIR_PREAMBLE: &str = "
I would like you to serve as an expert in PDDL, assisting me in correcting erroneous PDDL code. I will provide you with the incorrect PDDL along with the error messages returned by the system. You should output your thought process firstly. You MUST enclose the COMPLETE corrected PDDL within ```pddl```.
Here are some hints to help you debug the pddl domain file:
1. You should start by checking if all the essential domain constructs or domain definition constructs are present. Commonly included domains comprise:
    a. :domain declaration to name the domain.
    b. :requirements to specify the PDDL features used in the domain.
    c. :types to define any object types for categorizing entities in the planning problem.
    d. :constants (if necessary) to declare any objects that remain static throughout the planning problems.
    e. :predicates to define the properties and relations between objects that can change over time.
    f. :functions (if necessary) to define numeric functions for more complex domains.
    g. :action definitions for each action that agents can perform, including parameters, preconditions, and effects.
2. You need to check the number of parameters of each actions.
3. Having :typing in the domain indicates that it uses a hierarchy to organize objects. Therefore, it's crucial to clearly list all object types related to the planning task in a :types section.
4. '-' should not appear in :types.
";

const ROUND_HISTORY: &str = "
Round [Round]
Incorrect PDDL:
[PDDL]
Error Information:
[Error]
";

const ROUND_CURRENT: &str = "
Round [Round]
Incorrect PDDL:
[PDDL]
Error Information:
[Error]
Corrected PDDL:
[Corrected_PDDL]
";

/// Builds the prompt for the next correction round.
pub trait FeedbackRenderer: Send + Sync {
    /// `prompt` is the prompt of the previous round, `trace` the rounds so
    /// far, `failed` the artifact text that just failed, `diagnostic` the
    /// validator's verdict text.
    fn extend(
        &self,
        prompt: &str,
        trace: &[CorrectionRecord],
        failed: &str,
        diagnostic: &str,
    ) -> String;
}

/// Rebuilds the dedicated repair prompt from scratch each round: preamble,
/// then one block per earlier round, then the current failure with an empty
/// "Corrected PDDL" slot for the model to fill.
pub struct DomainFeedback;

impl FeedbackRenderer for DomainFeedback {
    fn extend(
        &self,
        _prompt: &str,
        trace: &[CorrectionRecord],
        failed: &str,
        diagnostic: &str,
    ) -> String {
        let mut blocks: Vec<String> = trace
            .iter()
            .map(|record| {
                ROUND_HISTORY
                    .replace("[Round]", &record.round.to_string())
                    .replace("[PDDL]", &record.incorrect)
                    .replace("[Error]", &record.error_info)
            })
            .collect();
        blocks.push(
            ROUND_CURRENT
                .replace("[Round]", &trace.len().to_string())
                .replace("[PDDL]", failed)
                .replace("[Corrected_PDDL]", "")
                .replace("[Error]", diagnostic),
        );
        format!("{}\n\n{}", DOMAIN_REPAIR_PREAMBLE, blocks.join("\n\n"))
    }
}

/// Grows the original generation prompt by appending one error sentence per
/// failed round, so the prompt accumulates across the loop.
pub struct InterfaceFeedback;

impl FeedbackRenderer for InterfaceFeedback {
    fn extend(
        &self,
        prompt: &str,
        _trace: &[CorrectionRecord],
        failed: &str,
        diagnostic: &str,
    ) -> String {
        format!(
            "{prompt}\nThe generated natural language interface {failed} occurs error: {diagnostic}. You need to carefully review your answer and output the correct natural language interface. The corrected natural language interface should also be wrapped in ```python```:\n"
        )
    }
}
