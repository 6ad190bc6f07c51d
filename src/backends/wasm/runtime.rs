// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wasmtime-backed script runtime using the C-style memory ABI.
//!
//! A script module must export:
//!
//! | Export       | Signature                   |
//! |--------------|-----------------------------|
//! | `memory`     | linear memory               |
//! | `allocate`   | `(size: i32) -> ptr: i32`   |
//! | `deallocate` | `(ptr: i32, size: i32)`     |
//! | `process`    | `(in_ptr: i32, in_len: i32, out_len_ptr: i32) -> out_ptr: i32` |
//!
//! The host allocates and writes the input, calls `process`, reads the output
//! length (little-endian i32) from `out_len_ptr` and copies the result out.
//! Every invocation runs in a fresh `Store` with its own fuel budget, so a
//! runaway script cannot starve the worker.

use std::path::Path;
use wasmtime::{Config, Engine, Instance, Memory, Module, Store, Trap, TypedFunc};

use super::error::{ScriptError, ScriptResult};
use crate::config::FuelConfig;
use crate::model::ScriptSource;
use crate::traits::ScriptRuntime;

pub struct WasmScriptRuntime {
    engine: Engine,
    fuel: u64,
}

impl WasmScriptRuntime {
    pub fn new(fuel: u64) -> ScriptResult<Self> {
        let mut config = Config::new();
        config.consume_fuel(true);
        let engine = Engine::new(&config).map_err(|e| ScriptError::Engine(e.to_string()))?;
        Ok(Self { engine, fuel })
    }

    /// Runtime using the configured default fuel level, clamped to its bounds.
    pub fn from_config(fuel: &FuelConfig) -> ScriptResult<Self> {
        Self::new(fuel.validate_and_clamp(fuel.get_default()))
    }

    pub fn fuel(&self) -> u64 {
        self.fuel
    }

    fn load(&self, source: &ScriptSource) -> ScriptResult<Module> {
        match source {
            ScriptSource::Code(text) => Module::new(&self.engine, text.as_bytes())
                .map_err(|e| ScriptError::Compile(e.to_string())),
            ScriptSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|source| ScriptError::Io {
                    path: display(path),
                    source,
                })?;
                Module::new(&self.engine, &bytes).map_err(|e| ScriptError::Compile(e.to_string()))
            }
        }
    }

    fn trap(&self, error: wasmtime::Error) -> ScriptError {
        if error.downcast_ref::<Trap>() == Some(&Trap::OutOfFuel) {
            ScriptError::FuelExhausted { fuel: self.fuel }
        } else {
            ScriptError::Trap(error.to_string())
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl ScriptRuntime for WasmScriptRuntime {
    fn run(&self, source: &ScriptSource, input: &[u8]) -> ScriptResult<Vec<u8>> {
        let module = self.load(source)?;
        let mut store = Store::new(&self.engine, ());
        store
            .set_fuel(self.fuel)
            .map_err(|e| ScriptError::Engine(e.to_string()))?;

        let instance = Instance::new(&mut store, &module, &[]).map_err(|e| self.trap(e))?;
        let abi = Abi::bind(&mut store, &instance)?;
        abi.process(self, &mut store, input)
    }
}

/// Exports resolved from one module instance.
struct Abi {
    memory: Memory,
    allocate: TypedFunc<i32, i32>,
    deallocate: TypedFunc<(i32, i32), ()>,
    process: TypedFunc<(i32, i32, i32), i32>,
}

impl Abi {
    fn bind(store: &mut Store<()>, instance: &Instance) -> ScriptResult<Self> {
        let memory = instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| ScriptError::MissingExport("'memory'".to_string()))?;
        let allocate = instance
            .get_typed_func::<i32, i32>(&mut *store, "allocate")
            .map_err(|_| ScriptError::MissingExport("'allocate' with signature (i32) -> i32".to_string()))?;
        let deallocate = instance
            .get_typed_func::<(i32, i32), ()>(&mut *store, "deallocate")
            .map_err(|_| ScriptError::MissingExport("'deallocate' with signature (i32, i32)".to_string()))?;
        let process = instance
            .get_typed_func::<(i32, i32, i32), i32>(&mut *store, "process")
            .map_err(|_| {
                ScriptError::MissingExport("'process' with signature (i32, i32, i32) -> i32".to_string())
            })?;
        Ok(Self {
            memory,
            allocate,
            deallocate,
            process,
        })
    }

    fn process(
        &self,
        runtime: &WasmScriptRuntime,
        store: &mut Store<()>,
        input: &[u8],
    ) -> ScriptResult<Vec<u8>> {
        let input_len = i32::try_from(input.len()).map_err(|_| ScriptError::InputTooLarge(input.len()))?;

        let input_ptr = self.allocate(runtime, store, input_len)?;
        self.memory
            .write(&mut *store, as_offset(input_ptr)?, input)
            .map_err(|e| ScriptError::Memory(format!("failed to write input: {}", e)))?;

        let out_len_ptr = match self.allocate(runtime, store, 4) {
            Ok(ptr) => ptr,
            Err(e) => {
                self.release(store, input_ptr, input_len);
                return Err(e);
            }
        };

        let result_ptr = self
            .process
            .call(&mut *store, (input_ptr, input_len, out_len_ptr))
            .map_err(|e| runtime.trap(e));
        self.release(store, input_ptr, input_len);
        let result_ptr = match result_ptr {
            Ok(ptr) => ptr,
            Err(e) => {
                self.release(store, out_len_ptr, 4);
                return Err(e);
            }
        };

        let mut len_bytes = [0u8; 4];
        let read_len = self
            .memory
            .read(&mut *store, as_offset(out_len_ptr)?, &mut len_bytes)
            .map_err(|e| ScriptError::Memory(format!("failed to read output length: {}", e)));
        self.release(store, out_len_ptr, 4);
        read_len?;

        let output_len = i32::from_le_bytes(len_bytes);
        if output_len < 0 {
            return Err(ScriptError::Memory(format!("negative output length {}", output_len)));
        }
        if output_len == 0 {
            return Ok(Vec::new());
        }
        if result_ptr == 0 {
            return Err(ScriptError::Memory("process returned a null pointer".to_string()));
        }

        // bounds are checked against linear memory before allocating host side
        let offset = as_offset(result_ptr)?;
        let memory_size = self.memory.data_size(&*store);
        let in_bounds = offset
            .checked_add(output_len as usize)
            .map_or(false, |end| end <= memory_size);
        if !in_bounds {
            return Err(ScriptError::Memory(format!(
                "output of {} bytes at {} exceeds linear memory of {} bytes",
                output_len, offset, memory_size
            )));
        }

        let mut output = vec![0u8; output_len as usize];
        self.memory
            .read(&mut *store, offset, &mut output)
            .map_err(|e| ScriptError::Memory(format!("failed to read output: {}", e)))?;
        self.release(store, result_ptr, output_len);

        Ok(output)
    }

    fn allocate(&self, runtime: &WasmScriptRuntime, store: &mut Store<()>, size: i32) -> ScriptResult<i32> {
        let ptr = self.allocate.call(&mut *store, size).map_err(|e| runtime.trap(e))?;
        if ptr == 0 {
            return Err(ScriptError::Memory(format!("allocate({}) returned a null pointer", size)));
        }
        Ok(ptr)
    }

    /// Best effort; the store is dropped after the call anyway.
    fn release(&self, store: &mut Store<()>, ptr: i32, size: i32) {
        let _ = self.deallocate.call(&mut *store, (ptr, size));
    }
}

fn as_offset(ptr: i32) -> ScriptResult<usize> {
    usize::try_from(ptr).map_err(|_| ScriptError::Memory(format!("invalid pointer {}", ptr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::wasm::test_modules::{
        DOUBLER_WAT, LOOPING_WAT, NO_EXPORTS_WAT, OVERSIZED_OUTPUT_WAT, TRAPPING_WAT,
    };

    fn code(text: &str) -> ScriptSource {
        ScriptSource::Code(text.to_string())
    }

    #[test]
    fn doubles_each_byte() {
        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        let output = runtime.run(&code(DOUBLER_WAT), &[1, 2, 3, 100]).unwrap();
        assert_eq!(output, vec![2, 4, 6, 200]);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        assert!(runtime.run(&code(DOUBLER_WAT), &[]).unwrap().is_empty());
    }

    #[test]
    fn compiled_module_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doubler.wasm");
        std::fs::write(&path, wat::parse_str(DOUBLER_WAT).unwrap()).unwrap();

        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        let output = runtime.run(&ScriptSource::File(path), &[5]).unwrap();
        assert_eq!(output, vec![10]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        let err = runtime
            .run(&ScriptSource::File("/definitely/not/here.wasm".into()), b"x")
            .unwrap_err();
        assert!(matches!(err, ScriptError::Io { .. }));
    }

    #[test]
    fn trap_is_reported() {
        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        let err = runtime.run(&code(TRAPPING_WAT), b"x").unwrap_err();
        assert!(matches!(err, ScriptError::Trap(_)), "got {:?}", err);
    }

    #[test]
    fn runaway_script_runs_out_of_fuel() {
        let runtime = WasmScriptRuntime::new(10_000).unwrap();
        let err = runtime.run(&code(LOOPING_WAT), b"x").unwrap_err();
        assert!(matches!(err, ScriptError::FuelExhausted { fuel: 10_000 }), "got {:?}", err);
    }

    #[test]
    fn output_beyond_linear_memory_is_rejected() {
        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        let err = runtime.run(&code(OVERSIZED_OUTPUT_WAT), b"x").unwrap_err();
        assert!(matches!(err, ScriptError::Memory(ref m) if m.contains("exceeds linear memory")), "got {:?}", err);
    }

    #[test]
    fn abi_mismatch_names_export() {
        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        let err = runtime.run(&code(NO_EXPORTS_WAT), b"x").unwrap_err();
        assert!(matches!(err, ScriptError::MissingExport(ref e) if e.contains("memory")));
    }

    #[test]
    fn invalid_text_does_not_compile() {
        let runtime = WasmScriptRuntime::new(1_000_000).unwrap();
        let err = runtime.run(&code("(module (func"), b"x").unwrap_err();
        assert!(matches!(err, ScriptError::Compile(_)));
    }

    #[test]
    fn fuel_comes_from_config() {
        let runtime = WasmScriptRuntime::from_config(&FuelConfig::default()).unwrap();
        assert_eq!(runtime.fuel(), crate::config::consts::DEFAULT_FUEL_LEVEL);
    }
}
