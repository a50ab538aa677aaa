//! Codificação sem perdas (MessagePack) de argumentos e resultados.
//!
//! O JSON gravado nas entradas é só para leitura humana: nele `NaN` e
//! `±inf` viram `null`. A comparação de argumentos e o resultado
//! devolvido pelo cache usam MessagePack, que preserva os bits dos floats
//! e distingue `null` de lista vazia.

use std::fmt;

use serde::de::{self, DeserializeOwned, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::errors::{CacheError, CacheResult};

/// Codifica `value` em MessagePack, com structs como mapas nomeados.
pub(crate) fn pack<V: Serialize + ?Sized>(value: &V) -> CacheResult<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Decodifica bytes gerados por [`pack`] ou [`pack_canonical`].
pub(crate) fn unpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

/// Codifica `value` em forma canônica.
///
/// Chaves de mapas saem ordenadas, então valores iguais geram bytes iguais
/// mesmo quando vêm de um `HashMap`.
pub(crate) fn pack_canonical<V: Serialize + ?Sized>(value: &V) -> CacheResult<Vec<u8>> {
    let raw = pack(value)?;
    let canonical: Canonical =
        rmp_serde::from_slice(&raw).map_err(|e| CacheError::Serialization(e.to_string()))?;
    pack(&canonical)
}

/// Separa um valor com forma de mapa (struct, mapa de chave texto) em
/// campos, cada um em forma canônica. `()` e `None` não têm campos.
pub(crate) fn pack_fields<V: Serialize + ?Sized>(
    value: &V,
) -> CacheResult<Vec<(String, Vec<u8>)>> {
    let raw = pack(value)?;
    let canonical: Canonical =
        rmp_serde::from_slice(&raw).map_err(|e| CacheError::Serialization(e.to_string()))?;

    match canonical {
        Canonical::Nil => Ok(Vec::new()),
        Canonical::Map(entries) => entries
            .into_iter()
            .map(|(key, value)| match key {
                Canonical::Str(name) => Ok((name, pack(&value)?)),
                other => Err(CacheError::Serialization(format!(
                    "nome de argumento deve ser texto, obtido: {}",
                    other.kind()
                ))),
            })
            .collect(),
        other => Err(CacheError::Serialization(format!(
            "argumentos nomeados devem serializar como mapa, obtido: {}",
            other.kind()
        ))),
    }
}

/// Árvore de valores MessagePack com mapas ordenados pela codificação da chave.
#[derive(Debug, Clone)]
enum Canonical {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Canonical>),
    Map(Vec<(Canonical, Canonical)>),
}

impl Canonical {
    fn kind(&self) -> &'static str {
        match self {
            Canonical::Nil => "nil",
            Canonical::Bool(_) => "bool",
            Canonical::Int(_) | Canonical::UInt(_) => "inteiro",
            Canonical::F32(_) | Canonical::F64(_) => "float",
            Canonical::Str(_) => "texto",
            Canonical::Bytes(_) => "bytes",
            Canonical::Seq(_) => "lista",
            Canonical::Map(_) => "mapa",
        }
    }
}

impl Serialize for Canonical {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Canonical::Nil => serializer.serialize_unit(),
            Canonical::Bool(v) => serializer.serialize_bool(*v),
            Canonical::Int(v) => serializer.serialize_i64(*v),
            Canonical::UInt(v) => serializer.serialize_u64(*v),
            Canonical::F32(v) => serializer.serialize_f32(*v),
            Canonical::F64(v) => serializer.serialize_f64(*v),
            Canonical::Str(v) => serializer.serialize_str(v),
            Canonical::Bytes(v) => serializer.serialize_bytes(v),
            Canonical::Seq(items) => serializer.collect_seq(items),
            Canonical::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Canonical {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CanonicalVisitor)
    }
}

struct CanonicalVisitor;

impl<'de> Visitor<'de> for CanonicalVisitor {
    type Value = Canonical;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("um valor MessagePack")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Canonical, E> {
        Ok(Canonical::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Canonical, E> {
        // Inteiros não negativos têm uma única forma
        if v >= 0 {
            Ok(Canonical::UInt(v as u64))
        } else {
            Ok(Canonical::Int(v))
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Canonical, E> {
        Ok(Canonical::UInt(v))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<Canonical, E> {
        Ok(Canonical::F32(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Canonical, E> {
        Ok(Canonical::F64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Canonical, E> {
        Ok(Canonical::Str(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Canonical, E> {
        Ok(Canonical::Str(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Canonical, E> {
        Ok(Canonical::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Canonical, E> {
        Ok(Canonical::Bytes(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Canonical, E> {
        Ok(Canonical::Nil)
    }

    fn visit_none<E: de::Error>(self) -> Result<Canonical, E> {
        Ok(Canonical::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Canonical, D::Error> {
        Canonical::deserialize(deserializer)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Canonical, D::Error> {
        Canonical::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Canonical, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Canonical::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Canonical, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<Canonical, Canonical>()? {
            let sort_key =
                rmp_serde::to_vec(&key).map_err(<A::Error as de::Error>::custom)?;
            entries.push((sort_key, key, value));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Canonical::Map(
            entries.into_iter().map(|(_, k, v)| (k, v)).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_non_finite_floats_are_distinct() {
        let inf = pack_canonical(&f64::INFINITY).unwrap();
        let neg = pack_canonical(&f64::NEG_INFINITY).unwrap();
        let nan = pack_canonical(&f64::NAN).unwrap();

        assert_ne!(inf, neg);
        assert_ne!(inf, nan);
        assert_ne!(neg, nan);
    }

    #[test]
    fn test_none_and_empty_list_are_distinct() {
        let none = pack_canonical(&None::<Vec<i32>>).unwrap();
        let empty = pack_canonical(&Some(Vec::<i32>::new())).unwrap();
        assert_ne!(none, empty);
    }

    #[test]
    fn test_hashmap_order_does_not_matter() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..32 {
            a.insert(format!("k{i}"), i);
        }
        for i in (0..32).rev() {
            b.insert(format!("k{i}"), i);
        }

        let sorted: BTreeMap<_, _> = a.clone().into_iter().collect();
        assert_eq!(pack_canonical(&a).unwrap(), pack_canonical(&b).unwrap());
        assert_eq!(pack_canonical(&a).unwrap(), pack_canonical(&sorted).unwrap());
    }

    #[test]
    fn test_canonical_bytes_decode_back() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Params {
            lr: f64,
            layers: Vec<u32>,
            tag: Option<String>,
        }

        let params = Params {
            lr: f64::NAN,
            layers: vec![64, 32],
            tag: None,
        };
        let decoded: Params = unpack(&pack_canonical(&params).unwrap()).unwrap();
        assert!(decoded.lr.is_nan());
        assert_eq!(decoded.layers, vec![64, 32]);
        assert_eq!(decoded.tag, None);
    }

    #[test]
    fn test_pack_fields_splits_struct() {
        #[derive(Serialize)]
        struct Opts {
            scale: f64,
            label: &'static str,
        }

        let fields = pack_fields(&Opts {
            scale: f64::INFINITY,
            label: "x",
        })
        .unwrap();
        let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["label", "scale"]);

        let scale: f64 = unpack(&fields[1].1).unwrap();
        assert_eq!(scale, f64::INFINITY);

        assert!(pack_fields(&()).unwrap().is_empty());
        assert!(pack_fields(&42).is_err());
        assert!(pack_fields(&BTreeMap::from([(1u8, 2u8)])).is_err());
    }

    #[test]
    fn test_integer_forms_agree() {
        assert_eq!(pack_canonical(&7i64).unwrap(), pack_canonical(&7u8).unwrap());
        assert_ne!(pack_canonical(&-7i64).unwrap(), pack_canonical(&7i64).unwrap());
    }
}
