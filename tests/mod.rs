// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod sql_gen;
