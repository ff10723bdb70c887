// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RunOptions, TestPacket, TestRunner};
use crate::{
    aggregator::ExceptionAggregator,
    errors::{SetupError, TestError},
    list::{InheritedScope, RunnableTest, TestMethodGroup},
    reporter::{ExecutionEventKind, MessageBus},
};
use cascade_metadata::{IdentityChain, RunSummary};
use tracing::{debug, instrument};

/// Runs the tests of a single method.
///
/// Tests are validated and their arguments resolved before anything is published. Tests are then
/// run in order, bracketed by test case; a failing test never stops its siblings.
#[derive(Clone, Copy, Debug)]
pub struct TestMethodRunner<'a> {
    bus: &'a MessageBus,
    options: &'a RunOptions,
}

impl<'a> TestMethodRunner<'a> {
    /// Creates a new runner publishing to `bus`.
    pub fn new(bus: &'a MessageBus, options: &'a RunOptions) -> Self {
        Self { bus, options }
    }

    /// Runs `method` with the state inherited from its enclosing scopes.
    ///
    /// Returns an error, without publishing any event, if a test doesn't belong to the method or
    /// its arguments can't be resolved.
    #[instrument(level = "debug", skip_all, fields(method = %method.info.chain))]
    pub async fn run(
        &self,
        method: &TestMethodGroup,
        scope: &InheritedScope,
    ) -> Result<RunSummary, SetupError> {
        let tests = self.setup(method)?;
        let chain = &method.info.chain;
        let scope = scope.extend(&method.info);

        self.bus.publish(ExecutionEventKind::TestMethodStarting {
            chain: chain.clone(),
            name: method.info.name.clone(),
            traits: scope.traits.clone(),
        });

        let runner = TestRunner::new(self.bus, self.options);
        let mut summary = RunSummary::default();

        for case in tests.chunk_by(|a, b| {
            a.descriptor.chain.test_case_chain() == b.descriptor.chain.test_case_chain()
        }) {
            if self.bus.cancellation().is_cancelled() {
                debug!("run cancelled, not starting further test cases");
                break;
            }

            let case_chain = case[0].descriptor.chain.test_case_chain();
            self.bus.publish(ExecutionEventKind::TestCaseStarting {
                chain: case_chain.clone(),
                name: case[0].descriptor.case_name().to_owned(),
            });

            let mut case_summary = RunSummary::default();
            for test in case {
                let packet = TestPacket::with_scope(test.clone(), &scope);
                case_summary += &runner.run(packet, scope.errors.clone()).await;
            }

            self.bus.publish(ExecutionEventKind::TestCaseFinished {
                chain: case_chain,
                summary: case_summary,
            });
            summary += &case_summary;
        }

        self.bus.publish(ExecutionEventKind::TestMethodFinished {
            chain: chain.clone(),
            summary,
        });
        Ok(summary)
    }

    fn setup(&self, method: &TestMethodGroup) -> Result<Vec<RunnableTest>, SetupError> {
        let expected = method.info.chain.leaf_id();
        method
            .tests
            .iter()
            .map(|test| {
                let descriptor = &test.descriptor;
                if descriptor.chain.method.as_ref() != Some(expected) {
                    return Err(SetupError::ForeignTest {
                        test: descriptor.id().clone(),
                        expected: expected.clone(),
                        actual: descriptor.chain.method.clone(),
                    });
                }

                let Some(resolver) = &method.resolver else {
                    return Ok(test.clone());
                };
                let mut aggregator = ExceptionAggregator::new();
                match aggregator.record(|| resolver.resolve(test)) {
                    Some(arguments) => Ok(test
                        .clone()
                        .with_constructor_arguments(arguments.constructor)
                        .with_method_arguments(arguments.method)),
                    None => Err(SetupError::ArgumentResolution {
                        test: descriptor.id().clone(),
                        error: aggregator
                            .to_error()
                            .unwrap_or_else(|| resolution_failed(&descriptor.chain)),
                    }),
                }
            })
            .collect()
    }
}

fn resolution_failed(chain: &IdentityChain) -> TestError {
    TestError::new(
        "ArgumentResolution",
        format!("failed to resolve arguments for {chain}"),
    )
}
