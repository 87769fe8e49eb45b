//! Post-construction field injection
//!
//! Probes each declared field in order: user override, built-in
//! injection attribute, custom attribute pipeline. Promoted
//! (constructor-declared) fields are skipped unless an override or an
//! attribute explicitly targets them. Runs strictly between
//! construction and method invocation.

use crate::attributes::{AttributeTarget, InfuseSpec, PipelineOutcome};
use crate::blueprint::{ClassSpec, PropertySpec};
use crate::class_resolver::{self, MethodPolicy};
use crate::container::Container;
use crate::definition::Value;
use crate::error::{DiError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Inject every eligible field of the class and its ancestors.
pub(crate) fn resolve(container: &Container, class: &ClassSpec, instance: &Value) -> Result<()> {
    let repo = container.repository();
    let overrides = repo.overrides_for(&class.name).properties;
    let options = repo.options();

    // Declaring class first, then each ancestor's fields.
    let mut owners: Vec<Arc<ClassSpec>> = Vec::new();
    let mut parent = class.parent.clone();
    while let Some(name) = parent {
        match repo.class(&name) {
            Some(spec) => {
                parent = spec.parent.clone();
                owners.push(spec);
            }
            None => break,
        }
    }

    for property in &class.properties {
        inject(container, class, property, instance, &overrides, &options)?;
    }
    for owner in &owners {
        for property in &owner.properties {
            inject(container, owner, property, instance, &overrides, &options)?;
        }
    }

    Ok(())
}

fn inject(
    container: &Container,
    owner: &ClassSpec,
    property: &PropertySpec,
    instance: &Value,
    overrides: &std::collections::BTreeMap<String, Value>,
    options: &crate::repository::ContainerOptions,
) -> Result<()> {
    let repo = container.repository();
    let _frame = repo.trace_push(format!("prop:{}::{}", owner.name, property.name), true);

    let override_value = overrides.get(&property.name);
    if property.promoted && override_value.is_none() && property.attributes.is_empty() {
        return Ok(());
    }

    // User override wins outright.
    if let Some(v) = override_value {
        #[cfg(feature = "logging")]
        trace!(
            target: "syringa",
            class = %owner.name,
            property = %property.name,
            source = "override",
            "injecting property"
        );
        return (property.set)(instance, Arc::clone(v));
    }

    if !options.property_attributes || property.attributes.is_empty() {
        return Ok(());
    }

    let location = format!("{}::{}", owner.name, property.name);

    // Built-in injection attribute.
    if let Some(attribute) = property.attributes.iter().find(|a| a.is_infuse()) {
        let spec = attribute.infuse_spec(&location)?;
        let produced = match &spec {
            InfuseSpec::ByType => {
                let type_name = property.type_name.as_deref().ok_or_else(|| {
                    DiError::attribute(&location, "no declared type to inject by")
                })?;
                class_resolver::resolve(container, type_name, None, MethodPolicy::Auto, false)?
                    .instance
            }
            _ => class_resolver::resolve_infuse(
                container,
                &spec,
                property.type_name.as_deref(),
                &location,
            )?,
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "syringa",
            class = %owner.name,
            property = %property.name,
            source = "attribute",
            "injecting property"
        );
        return (property.set)(instance, produced);
    }

    // Custom attribute pipeline; first non-sentinel value wins.
    let target = AttributeTarget::Property {
        owner: &owner.name,
        name: &property.name,
        type_name: property.type_name.as_deref(),
    };
    if let PipelineOutcome::Handled(Some(v)) =
        repo.attributes().dispatch(&property.attributes, &target, container)?
    {
        #[cfg(feature = "logging")]
        trace!(
            target: "syringa",
            class = %owner.name,
            property = %property.name,
            source = "custom-attribute",
            "injecting property"
        );
        return (property.set)(instance, v);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{Attribute, AttributeOutcome, AttributeResolver};
    use crate::definition::{cast, value};
    use std::sync::Mutex;

    struct Report {
        title: Mutex<String>,
    }

    fn report_class() -> ClassSpec {
        ClassSpec::new("Report")
            .instantiate_with(|| {
                Ok(value(Report {
                    title: Mutex::new(String::new()),
                }))
            })
            .property(
                PropertySpec::new("title", |instance, v| {
                    let report = cast::<Report>(instance)?;
                    let title = cast::<String>(&v)?;
                    *report.title.lock().unwrap() = (*title).clone();
                    Ok(())
                })
                .typed("String"),
            )
    }

    #[test]
    fn test_user_override_sets_field() {
        let container = Container::new();
        container.register_class(report_class()).unwrap();
        container
            .register_properties("Report", [("title".to_string(), value("Q3".to_string()))])
            .unwrap();

        let v = container.get("Report").unwrap();
        let report = cast::<Report>(&v).unwrap();
        assert_eq!(*report.title.lock().unwrap(), "Q3");
    }

    #[test]
    fn test_promoted_field_skipped_without_target() {
        let container = Container::new();
        let class = ClassSpec::new("Promoted")
            .instantiate_with(|| Ok(value(0_u8)))
            .property(
                PropertySpec::new("inner", |_, _| {
                    panic!("promoted field must not be injected")
                })
                .promoted(),
            );
        container.register_class(class).unwrap();
        container.get("Promoted").unwrap();
    }

    #[test]
    fn test_custom_pipeline_first_value_wins() {
        struct FixedResolver(i64);
        impl AttributeResolver for FixedResolver {
            fn resolve(
                &self,
                _attribute: &Attribute,
                _target: &AttributeTarget<'_>,
                _container: &Container,
            ) -> Result<AttributeOutcome> {
                Ok(AttributeOutcome::Inject(value(self.0)))
            }
        }

        let container = Container::new();
        container
            .register_custom_attribute("Seeded", Arc::new(FixedResolver(41)))
            .unwrap();
        container
            .register_custom_attribute("Later", Arc::new(FixedResolver(99)))
            .unwrap();

        struct Holder {
            n: Mutex<i64>,
        }
        let class = ClassSpec::new("Holder")
            .instantiate_with(|| Ok(value(Holder { n: Mutex::new(0) })))
            .property(
                PropertySpec::new("n", |instance, v| {
                    let holder = cast::<Holder>(instance)?;
                    *holder.n.lock().unwrap() = *cast::<i64>(&v)?;
                    Ok(())
                })
                .attribute(Attribute::new("Seeded"))
                .attribute(Attribute::new("Later")),
            );
        container.register_class(class).unwrap();

        let v = container.get("Holder").unwrap();
        let holder = cast::<Holder>(&v).unwrap();
        assert_eq!(*holder.n.lock().unwrap(), 41);
    }

    #[test]
    fn test_property_attributes_toggle_off() {
        let container = Container::new();
        let mut options = container.repository().options();
        options.property_attributes = false;
        container.repository().set_options(options).unwrap();

        struct Holder {
            n: Mutex<i64>,
        }
        let class = ClassSpec::new("Holder")
            .instantiate_with(|| Ok(value(Holder { n: Mutex::new(-1) })))
            .property(
                PropertySpec::new("n", |instance, v| {
                    let holder = cast::<Holder>(instance)?;
                    *holder.n.lock().unwrap() = *cast::<i64>(&v)?;
                    Ok(())
                })
                .attribute(Attribute::new("Infuse").arg("seed")),
            );
        container.register_class(class).unwrap();
        container.bind("seed", crate::Definition::literal(3_i64)).unwrap();

        let v = container.get("Holder").unwrap();
        let holder = cast::<Holder>(&v).unwrap();
        // attribute probing disabled; the field keeps its constructed value
        assert_eq!(*holder.n.lock().unwrap(), -1);
    }
}
