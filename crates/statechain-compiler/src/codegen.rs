// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Code emission for a planned machine.
//!
//! Generates one module per machine using quote. All runtime items are
//! referenced through the runtime crate path, and std items through absolute
//! paths, so the module needs no `use` declarations of its own.

use proc_macro2::{Literal, TokenStream};
use quote::quote;
use statechain_dsl::RetryPolicyDefinition;

use crate::plan::{ChainPlan, StepPlan};

/// First line of every generated file.
pub const GENERATED_HEADER: &str =
    "// Code generated by statechain-compile from a machine description. DO NOT EDIT.";

/// Emit the complete module for one machine.
pub fn emit_machine(plan: &ChainPlan, rt: &TokenStream) -> TokenStream {
    let constant = emit_constant(plan);
    let handler_trait = emit_handler_trait(plan, rt);
    let workflow_fn = emit_workflow_fn(plan, rt);
    let registration_fn = emit_registration_fn(plan, rt);

    quote! {
        #constant
        #handler_trait
        #workflow_fn
        #registration_fn
    }
}

/// Render emitted tokens as file contents.
pub fn render(tokens: &TokenStream) -> String {
    format!("{}\n\n{}\n", GENERATED_HEADER, tokens)
}

// ============================================================================
// Items
// ============================================================================

fn emit_constant(plan: &ChainPlan) -> TokenStream {
    let ident = &plan.workflow_const;
    let name = plan.machine.as_str();
    let doc = format!(" Workflow name of the `{}` machine.", name);

    quote! {
        #[doc = #doc]
        pub const #ident: &str = #name;
    }
}

fn emit_handler_trait(plan: &ChainPlan, rt: &TokenStream) -> TokenStream {
    let ident = &plan.handler_trait;
    let payload = &plan.payload;
    let doc = format!(
        " Handlers for the `{}` machine, one method per transition.",
        plan.machine
    );

    let methods = plan.steps.iter().map(|step| {
        let method = &step.method;
        let doc = format!(" Transition `{}`.", step.name);
        quote! {
            #[doc = #doc]
            fn #method(&self, io: &mut #payload) -> #rt::StepResult;
        }
    });

    quote! {
        #[doc = #doc]
        pub trait #ident: Send + Sync + 'static {
            #(#methods)*
        }
    }
}

fn emit_workflow_fn(plan: &ChainPlan, rt: &TokenStream) -> TokenStream {
    let ident = &plan.workflow_fn;
    let handler_trait = &plan.handler_trait;
    let payload = &plan.payload;
    let workflow_const = &plan.workflow_const;
    let doc = format!(" Step chain of the `{}` machine bound to `handler`.", plan.machine);

    let steps = plan.steps.iter().map(|step| emit_step(step, payload, rt));

    quote! {
        #[doc = #doc]
        pub fn #ident<H>(handler: ::std::sync::Arc<H>) -> #rt::Workflow<#payload>
        where
            H: #handler_trait,
        {
            let steps = vec![
                #(#steps),*
            ];
            #rt::Workflow::from_validated(#workflow_const, steps)
        }
    }
}

fn emit_registration_fn(plan: &ChainPlan, rt: &TokenStream) -> TokenStream {
    let ident = &plan.registration_fn;
    let handler_trait = &plan.handler_trait;
    let workflow_fn = &plan.workflow_fn;
    let doc = format!(
        " Registration of the `{}` machine, ready for a workflow processor.",
        plan.machine
    );

    quote! {
        #[doc = #doc]
        pub fn #ident<H>(handler: H) -> #rt::Registration
        where
            H: #handler_trait,
        {
            #rt::Registration::new(#workflow_fn(::std::sync::Arc::new(handler)))
        }
    }
}

fn emit_step(step: &StepPlan, payload: &TokenStream, rt: &TokenStream) -> TokenStream {
    let name = step.name.as_str();
    let method = &step.method;
    let retries = step.retry.as_ref().map(|policy| {
        let policy = emit_retry_policy(policy, rt);
        quote! { .with_retries(#policy) }
    });

    quote! {
        {
            let handler = ::std::sync::Arc::clone(&handler);
            #rt::WorkflowStep::new(#name, move |io: &mut #payload| handler.#method(io))
                #retries
        }
    }
}

fn emit_retry_policy(policy: &RetryPolicyDefinition, rt: &TokenStream) -> TokenStream {
    let max_attempts = Literal::u32_unsuffixed(policy.max_attempts);
    let initial = Literal::u64_unsuffixed(policy.initial_retry_interval_seconds);
    let coefficient = coefficient_literal(policy.backoff_coefficient);
    let max_interval = Literal::u64_unsuffixed(policy.max_retry_interval_seconds);
    let timeout = Literal::u64_unsuffixed(policy.retry_timeout_seconds);

    quote! {
        #rt::RetryPolicy::new(#max_attempts, ::std::time::Duration::from_secs(#initial))
            .with_backoff_coefficient(#coefficient)
            .with_max_interval(::std::time::Duration::from_secs(#max_interval))
            .with_timeout(::std::time::Duration::from_secs(#timeout))
    }
}

/// JSON cannot carry NaN or infinity, but programmatic definitions can.
/// The runtime treats those as a flat backoff, so emit exactly that.
fn coefficient_literal(value: f64) -> Literal {
    if value.is_finite() {
        Literal::f64_unsuffixed(value)
    } else {
        tracing::warn!(value, "non-finite backoff coefficient emitted as 1.0");
        Literal::f64_unsuffixed(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statechain_dsl::{MachineDefinition, TransitionDefinition};

    fn plan() -> ChainPlan {
        ChainPlan::build(&MachineDefinition {
            name: "StateMachine".to_string(),
            payload: None,
            default_retry_policy: Some(RetryPolicyDefinition {
                max_attempts: 5,
                initial_retry_interval_seconds: 1,
                backoff_coefficient: 2.0,
                max_retry_interval_seconds: 10,
                retry_timeout_seconds: 60,
            }),
            transitions: vec![
                TransitionDefinition::new("foo"),
                TransitionDefinition::new("bar"),
                TransitionDefinition::new("baz"),
            ],
        })
        .unwrap()
    }

    fn rt() -> TokenStream {
        quote! { statechain_workflows }
    }

    #[test]
    fn test_emitted_items() {
        let code = emit_machine(&plan(), &rt()).to_string();

        assert!(code.contains("pub const STATE_MACHINE_WORKFLOW : & str = \"StateMachine\""));
        assert!(code.contains("pub trait StateMachineWorkflowHandler"));
        assert!(code.contains("fn foo (& self , io : & mut super :: StateMachine)"));
        assert!(code.contains("pub fn state_machine_workflow < H >"));
        assert!(code.contains("pub fn new_state_machine_workflow_registration < H >"));
        assert!(code.contains(
            "statechain_workflows :: Workflow :: from_validated (STATE_MACHINE_WORKFLOW , steps)"
        ));
    }

    #[test]
    fn test_steps_in_order_with_policy() {
        let code = emit_machine(&plan(), &rt()).to_string();

        let foo = code.find("WorkflowStep :: new (\"foo\"").unwrap();
        let bar = code.find("WorkflowStep :: new (\"bar\"").unwrap();
        let baz = code.find("WorkflowStep :: new (\"baz\"").unwrap();
        assert!(foo < bar && bar < baz);

        assert_eq!(code.matches(". with_retries").count(), 3);
        assert!(code.contains("RetryPolicy :: new (5 , :: std :: time :: Duration :: from_secs (1))"));
        assert!(code.contains("with_backoff_coefficient (2.0)"));
        assert!(code.contains("with_max_interval (:: std :: time :: Duration :: from_secs (10))"));
        assert!(code.contains("with_timeout (:: std :: time :: Duration :: from_secs (60))"));
    }

    #[test]
    fn test_no_policy_no_retries() {
        let plan = ChainPlan::build(&MachineDefinition {
            name: "Plain".to_string(),
            payload: Some("crate::Order".to_string()),
            default_retry_policy: None,
            transitions: vec![TransitionDefinition::new("only")],
        })
        .unwrap();
        let code = emit_machine(&plan, &rt()).to_string();

        assert!(!code.contains("with_retries"));
        assert!(code.contains("io : & mut crate :: Order"));
    }

    #[test]
    fn test_render_header() {
        let rendered = render(&emit_machine(&plan(), &rt()));
        assert!(rendered.starts_with(GENERATED_HEADER));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn test_non_finite_coefficient() {
        assert_eq!(coefficient_literal(f64::NAN).to_string(), "1.0");
        assert_eq!(coefficient_literal(1.5).to_string(), "1.5");
    }
}
