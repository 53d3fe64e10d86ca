// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-kind handlers plugged into the controller engine.

pub mod configmap;

pub use configmap::ConfigMapHandler;
