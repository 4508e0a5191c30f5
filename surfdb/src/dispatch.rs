/////////////////////////////////////////////////////////////////////////////////////////////
//
// Maps each evaluation method to the function that evaluates one lookup point.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # dispatch
//!
//! Picks the per-point evaluation function for a declared method, so calls
//! never re-parse the method name.

use crate::{
    config::EvalOptions,
    error::{DataKitError, Result},
    interp,
    metadata::{EvalMethod, ResponseDef},
    rbf,
    value::Value,
    DataKit,
};

/// Evaluates column `col` at one point `x`, ordered like the declared arguments.
pub(crate) type Evaluator = fn(&DataKit, &str, &ResponseDef, &[f64], &EvalOptions) -> Result<Value>;

/// Resolved once, when a column is declared.
pub(crate) fn evaluator_for(method: EvalMethod) -> Evaluator {
    match method {
        EvalMethod::Exact => eval_exact,
        EvalMethod::Function => eval_function,
        EvalMethod::Multilinear => eval_multilinear,
        EvalMethod::MultilinearSchedule => eval_multilinear_schedule,
        EvalMethod::Nearest => eval_nearest,
        EvalMethod::Rbf => eval_rbf,
        EvalMethod::RbfLinear => eval_rbf_linear,
        EvalMethod::RbfMap => eval_rbf_map,
    }
}

fn eval_exact(kit: &DataKit, col: &str, def: &ResponseDef, x: &[f64], opts: &EvalOptions) -> Result<Value> {
    interp::eval_exact(&kit.store, col, &def.args, x, opts)?.ok_or_else(|| DataKitError::EmptyMatch {
        col: col.to_string(),
        context: format!("no rows matching {:?} = {:?}", def.args, x),
    })
}

fn eval_nearest(kit: &DataKit, col: &str, def: &ResponseDef, x: &[f64], opts: &EvalOptions) -> Result<Value> {
    interp::eval_nearest(&kit.store, col, &def.args, x, opts)
}

fn eval_multilinear(kit: &DataKit, col: &str, def: &ResponseDef, x: &[f64], opts: &EvalOptions) -> Result<Value> {
    interp::eval_multilinear(&kit.store, &kit.bkpts, col, &def.args, x, None, None, opts.bracket_tol)
}

fn eval_multilinear_schedule(
    kit: &DataKit,
    col: &str,
    def: &ResponseDef,
    x: &[f64],
    opts: &EvalOptions,
) -> Result<Value> {
    interp::eval_multilinear_schedule(&kit.store, &kit.bkpts, col, &def.args, x, opts)
}

fn eval_rbf(kit: &DataKit, col: &str, _def: &ResponseDef, x: &[f64], _opts: &EvalOptions) -> Result<Value> {
    rbf::eval_rbf(&kit.rbfs, col, x)
}

fn eval_rbf_linear(kit: &DataKit, col: &str, def: &ResponseDef, x: &[f64], opts: &EvalOptions) -> Result<Value> {
    rbf::eval_rbf_linear(&kit.rbfs, &kit.bkpts, col, &def.args, x, opts)
}

fn eval_rbf_map(kit: &DataKit, col: &str, def: &ResponseDef, x: &[f64], opts: &EvalOptions) -> Result<Value> {
    rbf::eval_rbf_schedule(&kit.rbfs, &kit.bkpts, col, &def.args, x, opts)
}

fn eval_function(kit: &DataKit, col: &str, def: &ResponseDef, x: &[f64], _opts: &EvalOptions) -> Result<Value> {
    let function = def
        .function
        .as_ref()
        .ok_or_else(|| DataKitError::invalid(col, "no evaluation function registered"))?;
    function.call(kit, x)
}
