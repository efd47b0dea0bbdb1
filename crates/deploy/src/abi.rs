//! Argument encoding against contract ABIs.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{JsonAbi, Param},
    primitives::Bytes,
    sol,
};

sol! {
    /// OpenZeppelin `Ownable` surface used by the ownership handshake.
    interface IOwnable {
        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
    }
}

/// Encode constructor arguments (without bytecode) for a contract.
///
/// A contract without an explicit constructor accepts no arguments.
pub fn encode_constructor_args(abi: &JsonAbi, args: Vec<DynSolValue>) -> Result<Bytes, String> {
    match abi.constructor() {
        Some(constructor) => {
            let args = fit_params(&constructor.inputs, args)?;
            constructor
                .abi_encode_input(&args)
                .map(Into::into)
                .map_err(|e| e.to_string())
        }
        None if args.is_empty() => Ok(Bytes::new()),
        None => Err(format!(
            "contract has no constructor but {} arguments were given",
            args.len()
        )),
    }
}

/// Encode a call to the initializer `name` (selector included).
///
/// Overloads are disambiguated by argument count. A contract without the initializer
/// accepts an empty argument list, in which case the proxy is created without a call.
pub fn encode_initializer_call(
    abi: &JsonAbi,
    name: &str,
    args: Vec<DynSolValue>,
) -> Result<Bytes, String> {
    let candidates = abi.function(name).map(Vec::as_slice).unwrap_or_default();

    let Some(function) = candidates.iter().find(|f| f.inputs.len() == args.len()) else {
        if candidates.is_empty() && args.is_empty() {
            return Ok(Bytes::new());
        }
        return Err(format!(
            "no `{name}` function taking {} arguments in ABI",
            args.len()
        ));
    };

    let args = fit_params(&function.inputs, args)?;
    function
        .abi_encode_input(&args)
        .map(Into::into)
        .map_err(|e| e.to_string())
}

fn fit_params(params: &[Param], args: Vec<DynSolValue>) -> Result<Vec<DynSolValue>, String> {
    if params.len() != args.len() {
        return Err(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        ));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, value)| {
            let ty = param
                .resolve()
                .map_err(|e| format!("unsupported parameter type `{}`: {e}", param.ty))?;
            fit_value(&ty, value).map_err(|e| format!("argument `{}`: {e}", param.name))
        })
        .collect()
}

/// Rewrite integer widths in `value` to those declared by `ty`.
///
/// Argument builders produce integers without knowing the exact Solidity width, the ABI
/// decides it. Values that do not fit the declared width are rejected.
fn fit_value(ty: &DynSolType, value: DynSolValue) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Uint(bits), DynSolValue::Uint(v, _)) => {
            if v.bit_len() > *bits {
                return Err(format!("{v} does not fit in uint{bits}"));
            }
            Ok(DynSolValue::Uint(v, *bits))
        }
        (DynSolType::Int(bits), DynSolValue::Int(v, _)) => {
            if v.bits() as usize > *bits {
                return Err(format!("{v} does not fit in int{bits}"));
            }
            Ok(DynSolValue::Int(v, *bits))
        }
        (DynSolType::Array(inner), DynSolValue::Array(values)) => values
            .into_iter()
            .map(|v| fit_value(inner, v))
            .collect::<Result<_, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), DynSolValue::FixedArray(values)) => {
            if values.len() != *len {
                return Err(format!("expected {len} elements, got {}", values.len()));
            }
            values
                .into_iter()
                .map(|v| fit_value(inner, v))
                .collect::<Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), DynSolValue::Tuple(values)) => {
            if values.len() != types.len() {
                return Err(format!(
                    "expected tuple of {}, got {}",
                    types.len(),
                    values.len()
                ));
            }
            types
                .iter()
                .zip(values)
                .map(|(t, v)| fit_value(t, v))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Tuple)
        }
        (ty, value) => {
            if ty.matches(&value) {
                Ok(value)
            } else {
                Err(format!("value does not match type `{}`", ty.sol_type_name()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::{
        primitives::{Address, U256, address},
        sol_types::SolCall,
    };

    use super::*;

    fn abi(json: &str) -> JsonAbi {
        serde_json::from_str(json).unwrap()
    }

    const COMMITTEE_ABI: &str = r#"[
        {"type": "function", "name": "initialize", "stateMutability": "nonpayable", "outputs": [],
         "inputs": [
            {"name": "committee", "type": "address[]"},
            {"name": "stake", "type": "uint16[]"}
         ]}
    ]"#;

    #[test]
    fn test_initializer_fits_integer_widths() {
        let abi = abi(COMMITTEE_ABI);
        let members = vec![
            DynSolValue::Address(address!("00000000000000000000000000000000000000a1")),
            DynSolValue::Address(address!("00000000000000000000000000000000000000a2")),
        ];
        let stakes = vec![
            DynSolValue::Uint(U256::from(5000), 256),
            DynSolValue::Uint(U256::from(5000), 256),
        ];

        let calldata = encode_initializer_call(
            &abi,
            "initialize",
            vec![DynSolValue::Array(members), DynSolValue::Array(stakes)],
        )
        .unwrap();

        let function = &abi.function("initialize").unwrap()[0];
        assert_eq!(&calldata[..4], function.selector().as_slice());
    }

    #[test]
    fn test_initializer_rejects_overflowing_stake() {
        let abi = abi(COMMITTEE_ABI);

        let err = encode_initializer_call(
            &abi,
            "initialize",
            vec![
                DynSolValue::Array(vec![DynSolValue::Address(Address::ZERO)]),
                DynSolValue::Array(vec![DynSolValue::Uint(U256::from(70_000), 256)]),
            ],
        )
        .unwrap_err();

        assert!(err.contains("uint16"), "{err}");
    }

    #[test]
    fn test_initializer_arity_mismatch() {
        let abi = abi(COMMITTEE_ABI);
        let err = encode_initializer_call(&abi, "initialize", vec![]).unwrap_err();
        assert!(err.contains("0 arguments"), "{err}");
    }

    #[test]
    fn test_missing_initializer_without_args_is_empty() {
        let abi = abi("[]");
        assert!(encode_initializer_call(&abi, "initialize", vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_constructor_encoding() {
        let abi = abi(
            r#"[{"type": "constructor", "stateMutability": "nonpayable",
                 "inputs": [{"name": "_wETH", "type": "address"}]}]"#,
        );
        let weth = address!("fFf9976782d46CC05630D1f6eBAb18b2324d6B14");

        let encoded = encode_constructor_args(&abi, vec![DynSolValue::Address(weth)]).unwrap();

        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[12..], weth.as_slice());
    }

    #[test]
    fn test_constructor_type_mismatch() {
        let abi = abi(
            r#"[{"type": "constructor", "stateMutability": "nonpayable",
                 "inputs": [{"name": "_wETH", "type": "address"}]}]"#,
        );

        let err =
            encode_constructor_args(&abi, vec![DynSolValue::String("wETH".into())]).unwrap_err();
        assert!(err.contains("_wETH"), "{err}");
    }

    #[test]
    fn test_ownable_calldata() {
        let new_owner = address!("00000000000000000000000000000000000000b2");
        let call = IOwnable::transferOwnershipCall { newOwner: new_owner };
        let encoded = call.abi_encode();

        let decoded = IOwnable::transferOwnershipCall::abi_decode(&encoded, true).unwrap();
        assert_eq!(decoded.newOwner, new_owner);
    }
}
