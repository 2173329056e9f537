// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control request handlers: tree submission, arming, aborts, queries.

use super::{authorize, ListenCtx};
use crate::protocol::{JobSummary, Query, Request, Response, TreeOp, PROTOCOL_VERSION};
use pulse_core::JobId;
use pulse_engine::trees;

pub(crate) async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            tracing::debug!(client_version = %version, "hello");
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::SubmitTree {
            op,
            descriptor,
            instance_type,
            auth,
        } => {
            if let Err(e) = authorize(&auth, &ctx.auth) {
                return Response::Error { message: e };
            }
            submit_tree(op, descriptor, instance_type, ctx).await
        }

        Request::AllowExecution { root, auth } => {
            if let Err(e) = authorize(&auth, &ctx.auth) {
                return Response::Error { message: e };
            }
            match ctx.runtime.allow_execution(&JobId::new(root)).await {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::AbortJob { id, auth } => {
            if let Err(e) = authorize(&auth, &ctx.auth) {
                return Response::Error { message: e };
            }
            let resolved = {
                let state = ctx.runtime.state();
                let state = state.lock();
                state.job_by_prefix(&id).map(|job| job.id.clone())
            };
            match resolved {
                Some(id) => match ctx.runtime.abort(&id).await {
                    Ok(()) => Response::Ok,
                    Err(e) => Response::Error {
                        message: e.to_string(),
                    },
                },
                None => Response::Error {
                    message: format!("job not found: {id}"),
                },
            }
        }

        Request::Query { query, auth } => {
            if let Err(e) = authorize(&auth, &ctx.auth) {
                return Response::Error { message: e };
            }
            handle_query(query, ctx)
        }

        Request::OpenStream => Response::Error {
            message: "stream upgrade handled by the connection loop".into(),
        },

        Request::Shutdown { auth } => {
            if let Err(e) = authorize(&auth, &ctx.auth) {
                return Response::Error { message: e };
            }
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

async fn submit_tree(
    op: TreeOp,
    descriptor: Option<pulse_engine::TypeDescriptor>,
    instance_type: Option<String>,
    ctx: &ListenCtx,
) -> Response {
    let plan = match op {
        TreeOp::Register => {
            let Some(descriptor) = descriptor else {
                return Response::Error {
                    message: "register requires a type descriptor".into(),
                };
            };
            trees::register_tree(ctx.runtime.ids().as_ref(), &descriptor)
        }
        TreeOp::Startup | TreeOp::Shutdown | TreeOp::Deregister => {
            let Some(instance_type) = instance_type else {
                return Response::Error {
                    message: "operation requires an instance type".into(),
                };
            };
            let state = ctx.runtime.state();
            let state = state.lock();
            match op {
                TreeOp::Startup => {
                    trees::startup_tree(&state, ctx.runtime.ids().as_ref(), &instance_type)
                }
                TreeOp::Shutdown => {
                    trees::shutdown_tree(&state, ctx.runtime.ids().as_ref(), &instance_type)
                }
                TreeOp::Deregister => {
                    trees::deregister_tree(&state, ctx.runtime.ids().as_ref(), &instance_type)
                }
                TreeOp::Register => unreachable!("handled above"),
            }
        }
    };

    match ctx.runtime.submit_tree(plan).await {
        Ok(root) => Response::TreeSubmitted { root },
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

fn handle_query(query: Query, ctx: &ListenCtx) -> Response {
    let state = ctx.runtime.state();
    match query {
        Query::ListJobs => {
            let state = state.lock();
            let mut jobs: Vec<JobSummary> = state.jobs.values().map(JobSummary::from).collect();
            jobs.sort_by(|a, b| a.time_created.cmp(&b.time_created).then_with(|| a.id.cmp(&b.id)));
            Response::Jobs { jobs }
        }
        Query::GetJob { id } => {
            let state = state.lock();
            Response::Job {
                job: state.job_by_prefix(&id).cloned().map(Box::new),
            }
        }
        Query::GetTree { root } => {
            let state = state.lock();
            let root = match state.job_by_prefix(&root) {
                Some(job) => job.root.clone(),
                None => {
                    return Response::Error {
                        message: format!("job not found: {root}"),
                    }
                }
            };
            Response::Tree {
                jobs: state
                    .tree_of(root.as_str())
                    .into_iter()
                    .cloned()
                    .collect(),
            }
        }
        Query::ListNodes => {
            let state = state.lock();
            let mut nodes: Vec<_> = state.nodes.values().cloned().collect();
            nodes.sort_by(|a, b| a.id.cmp(&b.id));
            Response::Nodes { nodes }
        }
        Query::GetLog { id, position } => {
            let resolved = {
                let state = state.lock();
                state.job_by_prefix(&id).map(|job| job.id.clone())
            };
            let Some(id) = resolved else {
                return Response::Error {
                    message: format!("job not found: {id}"),
                };
            };
            match ctx.runtime.log_pipe().read_from(id.as_str(), position) {
                Ok(chunk) => Response::Log {
                    content: chunk.lines,
                    offset: chunk.offset,
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }
    }
}
