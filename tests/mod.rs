// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod demos;
mod scenarios;
